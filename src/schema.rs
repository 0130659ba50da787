use crate::error::{CopilotError, Result};
use crate::fx::FxRates;
use crate::period::MonthPeriod;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Two-part account category parsed from strings such as `"opex:travel"`.
///
/// `top` is lowercased so matching never depends on how the source spelled it;
/// `sub` keeps its source casing because it is shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryKey {
    pub top: String,
    pub sub: Option<String>,
}

impl CategoryKey {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((top, sub)) => Self {
                top: top.trim().to_lowercase(),
                sub: Some(sub.trim().to_string()),
            },
            None => Self {
                top: raw.trim().to_lowercase(),
                sub: None,
            },
        }
    }

    /// Exact top-level match with no subcategory (`"Revenue"` but not `"revenue:saas"`).
    pub fn is(&self, top: &str) -> bool {
        self.sub.is_none() && self.top == top
    }

    /// Any subcategory under `top` (`"Opex:Travel"` is under `"opex"`).
    pub fn is_under(&self, top: &str) -> bool {
        self.sub.is_some() && self.top == top
    }

    pub fn subcategory(&self) -> Option<&str> {
        self.sub.as_deref()
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub {
            Some(sub) => write!(f, "{}:{}", self.top, sub),
            None => write!(f, "{}", self.top),
        }
    }
}

pub const REVENUE: &str = "revenue";
pub const COGS: &str = "cogs";
pub const OPEX: &str = "opex";

/// One row of the actuals or budget table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub month_period: MonthPeriod,
    pub account_category: String,
    pub category: CategoryKey,
    pub amount: f64,
    /// `None` when the cell is empty or the table has no currency column.
    pub currency: Option<String>,
}

impl TransactionRow {
    pub fn new(
        month_period: MonthPeriod,
        account_category: impl Into<String>,
        amount: f64,
        currency: Option<&str>,
    ) -> Self {
        let account_category = account_category.into();
        Self {
            month_period,
            category: CategoryKey::parse(&account_category),
            account_category,
            amount,
            currency: currency.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionTable {
    /// Whether the source table carried a `currency` column at all. Without it
    /// every amount is already USD.
    pub has_currency: bool,
    pub rows: Vec<TransactionRow>,
}

impl TransactionTable {
    pub fn new(has_currency: bool, rows: Vec<TransactionRow>) -> Self {
        Self { has_currency, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest_month(&self) -> Option<MonthPeriod> {
        self.rows.iter().map(|r| r.month_period).max()
    }

    /// A copy holding only the rows accepted by `keep`, with the same shape.
    pub fn filtered<F>(&self, keep: F) -> TransactionTable
    where
        F: Fn(&TransactionRow) -> bool,
    {
        TransactionTable {
            has_currency: self.has_currency,
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashRow {
    pub month_period: MonthPeriod,
    pub cash_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRow {
    pub month_period: MonthPeriod,
    pub currency: String,
    pub rate_to_usd: f64,
}

/// The four read-only tables every query is computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialTables {
    pub actuals: TransactionTable,
    pub budget: TransactionTable,
    pub cash: Vec<CashRow>,
    pub fx: FxRates,
}

impl FinancialTables {
    pub fn latest_actuals_month(&self) -> Option<MonthPeriod> {
        self.actuals.latest_month()
    }

    pub fn latest_actuals_year(&self) -> Option<i32> {
        self.actuals.latest_month().map(|m| m.year())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum Metric {
    #[schemars(description = "(Revenue - COGS) / Revenue x 100, reported as 0 when revenue is not positive")]
    #[serde(rename = "Gross Margin")]
    GrossMargin,

    #[schemars(description = "Revenue - COGS - Opex, in USD")]
    #[serde(rename = "EBITDA")]
    Ebitda,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::GrossMargin => "Gross Margin",
            Metric::Ebitda => "EBITDA",
        }
    }

    /// Axis/series caption: "Gross Margin %" or "EBITDA (USD)".
    pub fn chart_caption(&self) -> String {
        match self {
            Metric::GrossMargin => format!("{} %", self.name()),
            Metric::Ebitda => format!("{} (USD)", self.name()),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = CopilotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gross margin" => Ok(Metric::GrossMargin),
            "ebitda" => Ok(Metric::Ebitda),
            _ => Err(CopilotError::UnknownMetric(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_key_parsing() {
        let key = CategoryKey::parse("Opex: Travel");
        assert_eq!(key.top, "opex");
        assert_eq!(key.subcategory(), Some("Travel"));
        assert!(key.is_under(OPEX));
        assert!(!key.is(OPEX));

        let key = CategoryKey::parse("  REVENUE ");
        assert!(key.is(REVENUE));
        assert!(!key.is_under(REVENUE));

        // Prefix without a colon is not an opex subcategory.
        assert!(!CategoryKey::parse("opex").is_under(OPEX));
        assert!(!CategoryKey::parse("opexes:rent").is_under(OPEX));
        assert!(!CategoryKey::parse("revenue:saas").is(REVENUE));
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("Gross Margin".parse::<Metric>().unwrap(), Metric::GrossMargin);
        assert_eq!("ebitda".parse::<Metric>().unwrap(), Metric::Ebitda);
        match "Net Income".parse::<Metric>() {
            Err(CopilotError::UnknownMetric(name)) => assert_eq!(name, "Net Income"),
            other => panic!("expected UnknownMetric, got {:?}", other),
        }
    }

    #[test]
    fn test_metric_serialization() {
        let json = serde_json::to_string(&Metric::GrossMargin).unwrap();
        assert_eq!(json, "\"Gross Margin\"");
        assert_eq!(Metric::Ebitda.chart_caption(), "EBITDA (USD)");
    }

    #[test]
    fn test_latest_month() {
        let jan = MonthPeriod::new(2025, 1).unwrap();
        let mar = MonthPeriod::new(2025, 3).unwrap();
        let table = TransactionTable::new(
            false,
            vec![
                TransactionRow::new(mar, "revenue", 10.0, None),
                TransactionRow::new(jan, "revenue", 5.0, None),
            ],
        );
        assert_eq!(table.latest_month(), Some(mar));
        assert_eq!(TransactionTable::default().latest_month(), None);
    }
}
