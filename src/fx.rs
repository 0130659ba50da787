use crate::error::{CopilotError, Result};
use crate::period::MonthPeriod;
use crate::schema::{CategoryKey, FxRow, TransactionTable};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub const BASE_CURRENCY: &str = "USD";

/// What to do with a foreign-currency row that has no matching FX rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FxMode {
    /// Treat the missing rate as 1.0 and carry the amount through unchanged.
    #[default]
    Lenient,
    /// Fail with `MissingFxRate`.
    Strict,
}

/// The FX table plus the policy for gaps in it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FxRates {
    pub rows: Vec<FxRow>,
    pub mode: FxMode,
}

impl FxRates {
    pub fn new(rows: Vec<FxRow>) -> Self {
        Self {
            rows,
            mode: FxMode::Lenient,
        }
    }

    pub fn with_mode(mut self, mode: FxMode) -> Self {
        self.mode = mode;
        self
    }

    fn lookup(&self) -> HashMap<(MonthPeriod, &str), f64> {
        let mut rates = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            let key = (row.month_period, row.currency.as_str());
            if rates.contains_key(&key) {
                warn!(
                    "Ignoring duplicate FX rate for {} in {}",
                    row.currency, row.month_period
                );
                continue;
            }
            rates.insert(key, row.rate_to_usd);
        }
        rates
    }
}

/// A transaction row with its USD equivalent attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub month_period: MonthPeriod,
    pub category: CategoryKey,
    pub amount: f64,
    pub rate_to_usd: f64,
    pub amount_usd: f64,
}

/// Converts every row of `table` to USD as `amount / rate_to_usd`, joining on
/// `(month_period, currency)`.
///
/// Tables without a currency column are already USD. Rows whose pair has no
/// rate use 1.0 in lenient mode; in strict mode a non-USD row without a rate
/// is an error. The input table is never modified.
pub fn normalize(table: &TransactionTable, fx: &FxRates) -> Result<Vec<NormalizedRow>> {
    if !table.has_currency {
        return Ok(table
            .rows
            .iter()
            .map(|row| NormalizedRow {
                month_period: row.month_period,
                category: row.category.clone(),
                amount: row.amount,
                rate_to_usd: 1.0,
                amount_usd: row.amount,
            })
            .collect());
    }

    let rates = fx.lookup();
    let mut defaulted: BTreeSet<(MonthPeriod, String)> = BTreeSet::new();
    let mut normalized = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let rate = match row.currency.as_deref() {
            Some(currency) => match rates.get(&(row.month_period, currency)) {
                Some(rate) => *rate,
                None => {
                    if fx.mode == FxMode::Strict && currency != BASE_CURRENCY {
                        return Err(CopilotError::MissingFxRate {
                            currency: currency.to_string(),
                            month: row.month_period.to_string(),
                        });
                    }
                    if currency != BASE_CURRENCY {
                        defaulted.insert((row.month_period, currency.to_string()));
                    }
                    1.0
                }
            },
            None => 1.0,
        };

        normalized.push(NormalizedRow {
            month_period: row.month_period,
            category: row.category.clone(),
            amount: row.amount,
            rate_to_usd: rate,
            amount_usd: row.amount / rate,
        });
    }

    for (month, currency) in defaulted {
        warn!(
            "No FX rate for {} in {}; assuming 1.0 to USD",
            currency, month
        );
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TransactionRow;

    fn may() -> MonthPeriod {
        MonthPeriod::new(2025, 5).unwrap()
    }

    fn cad_rates() -> FxRates {
        FxRates::new(vec![FxRow {
            month_period: may(),
            currency: "CAD".to_string(),
            rate_to_usd: 1.25,
        }])
    }

    #[test]
    fn test_converts_with_matching_rate() {
        let table = TransactionTable::new(
            true,
            vec![TransactionRow::new(may(), "revenue", 1800.0, Some("CAD"))],
        );
        let rows = normalize(&table, &cad_rates()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rate_to_usd, 1.25);
        assert_eq!(rows[0].amount_usd, 1440.0);
        // source untouched
        assert_eq!(table.rows[0].amount, 1800.0);
    }

    #[test]
    fn test_missing_rate_defaults_to_one() {
        let june = MonthPeriod::new(2025, 6).unwrap();
        let table = TransactionTable::new(
            true,
            vec![
                TransactionRow::new(june, "revenue", 1800.0, Some("CAD")),
                TransactionRow::new(june, "revenue", 300.0, None),
            ],
        );
        let rows = normalize(&table, &cad_rates()).unwrap();
        assert_eq!(rows[0].rate_to_usd, 1.0);
        assert_eq!(rows[0].amount_usd, 1800.0);
        assert_eq!(rows[1].amount_usd, 300.0);
    }

    #[test]
    fn test_table_without_currency_is_passthrough() {
        let table = TransactionTable::new(
            false,
            vec![TransactionRow::new(may(), "revenue", 1800.0, None)],
        );
        let rows = normalize(&table, &cad_rates().with_mode(FxMode::Strict)).unwrap();
        assert_eq!(rows[0].amount_usd, 1800.0);
    }

    #[test]
    fn test_strict_mode_rejects_missing_rate() {
        let june = MonthPeriod::new(2025, 6).unwrap();
        let table = TransactionTable::new(
            true,
            vec![TransactionRow::new(june, "revenue", 1800.0, Some("CAD"))],
        );
        let result = normalize(&table, &cad_rates().with_mode(FxMode::Strict));
        match result {
            Err(CopilotError::MissingFxRate { currency, month }) => {
                assert_eq!(currency, "CAD");
                assert_eq!(month, "2025-06");
            }
            other => panic!("expected MissingFxRate, got {:?}", other),
        }

        // USD never needs a rate
        let usd = TransactionTable::new(
            true,
            vec![TransactionRow::new(june, "revenue", 10.0, Some("USD"))],
        );
        let rows = normalize(&usd, &cad_rates().with_mode(FxMode::Strict)).unwrap();
        assert_eq!(rows[0].amount_usd, 10.0);
    }

    #[test]
    fn test_duplicate_rates_first_wins() {
        let mut fx = cad_rates();
        fx.rows.push(FxRow {
            month_period: may(),
            currency: "CAD".to_string(),
            rate_to_usd: 2.0,
        });
        let table = TransactionTable::new(
            true,
            vec![TransactionRow::new(may(), "cogs", 700.0, Some("CAD"))],
        );
        let rows = normalize(&table, &fx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount_usd, 560.0);
    }
}
