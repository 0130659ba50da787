//! Metric calculators.
//!
//! Every calculator is a pure function over the loaded tables: it filters the
//! rows it needs, converts them to USD through [`normalize`], and aggregates.
//! "Nothing to report for that period" comes back as `Ok(None)`; genuine
//! failures (bad month name, no cash data, ...) come back as errors.

use crate::config::MAX_TREND_MONTHS;
use crate::error::{CopilotError, Result};
use crate::fx::{normalize, FxRates, NormalizedRow};
use crate::period::MonthPeriod;
use crate::schema::{CashRow, Metric, TransactionTable, COGS, OPEX, REVENUE};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// Trailing months averaged for the burn rate.
pub const RUNWAY_WINDOW_MONTHS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueVsBudget {
    pub month: MonthPeriod,
    pub actual: f64,
    pub budget: f64,
}

impl RevenueVsBudget {
    pub fn variance(&self) -> f64 {
        self.actual - self.budget
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: MonthPeriod,
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTrend {
    pub metric: Metric,
    /// One point per month of the window, oldest first.
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpexLine {
    pub category: String,
    pub amount_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpexBreakdown {
    pub month: MonthPeriod,
    /// Largest spend first.
    pub lines: Vec<OpexLine>,
}

impl OpexBreakdown {
    pub fn total(&self) -> f64 {
        self.lines.iter().map(|l| l.amount_usd).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCashFlow {
    pub month: MonthPeriod,
    pub income: f64,
    pub expenses: f64,
    pub net_flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashRunway {
    /// `f64::INFINITY` when the business is not burning cash.
    pub runway_months: f64,
    pub latest_cash: f64,
    /// Average monthly net burn; negative means net inflow.
    pub avg_burn: f64,
    pub latest_cash_month: Option<MonthPeriod>,
    pub window: Vec<MonthlyCashFlow>,
}

impl CashRunway {
    pub fn is_infinite(&self) -> bool {
        self.runway_months.is_infinite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashPoint {
    pub month: MonthPeriod,
    pub label: String,
    pub cash_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashTrend {
    pub points: Vec<CashPoint>,
}

#[derive(Debug, Clone, Copy, Default)]
struct MonthlyTotals {
    revenue: f64,
    cogs: f64,
    opex: f64,
}

impl MonthlyTotals {
    fn add(&mut self, row: &NormalizedRow) {
        if row.category.is(REVENUE) {
            self.revenue += row.amount_usd;
        } else if row.category.is(COGS) {
            self.cogs += row.amount_usd;
        } else if row.category.is_under(OPEX) {
            self.opex += row.amount_usd;
        }
    }
}

fn in_range(month: MonthPeriod, start: MonthPeriod, end: MonthPeriod) -> bool {
    month >= start && month <= end
}

/// Rejects windows longer than [`MAX_TREND_MONTHS`] before anything is allocated.
fn check_window(n_months: u32) -> Result<()> {
    if n_months > MAX_TREND_MONTHS {
        return Err(CopilotError::WindowTooLarge {
            requested: n_months,
            max: MAX_TREND_MONTHS,
        });
    }
    Ok(())
}

fn month_revenue(table: &TransactionTable, fx: &FxRates, month: MonthPeriod) -> Result<f64> {
    let revenue = table.filtered(|r| r.category.is(REVENUE) && r.month_period == month);
    Ok(normalize(&revenue, fx)?.iter().map(|r| r.amount_usd).sum())
}

/// Actual and budgeted USD revenue for one month.
///
/// Returns `Ok(None)` when both sums are zero: that is read as "no data" rather
/// than a month with zero revenue.
pub fn revenue_vs_budget(
    actuals: &TransactionTable,
    budget: &TransactionTable,
    fx: &FxRates,
    month_name: &str,
    year: i32,
) -> Result<Option<RevenueVsBudget>> {
    let month = MonthPeriod::from_month_name(month_name, year)?;

    let actual = month_revenue(actuals, fx, month)?;
    let budgeted = month_revenue(budget, fx, month)?;

    if actual == 0.0 && budgeted == 0.0 {
        debug!("No revenue rows for {}", month);
        return Ok(None);
    }

    Ok(Some(RevenueVsBudget {
        month,
        actual,
        budget: budgeted,
    }))
}

/// Gross margin or EBITDA for each of the last `n_months` calendar months,
/// ending at the latest month present in `actuals`.
///
/// Months without activity still get a point. Gross margin is reported as 0
/// whenever revenue is not positive, which cannot be told apart from a true
/// break-even month.
pub fn financial_metric_trend(
    actuals: &TransactionTable,
    fx: &FxRates,
    metric: Metric,
    n_months: u32,
) -> Result<Option<MetricTrend>> {
    check_window(n_months)?;
    let Some(latest) = actuals.latest_month() else {
        return Ok(None);
    };
    let window = latest.trailing_window(n_months);
    let Some(&start) = window.first() else {
        return Ok(None);
    };

    debug!("{} trend window {}..={}", metric, start, latest);

    let recent = actuals.filtered(|r| in_range(r.month_period, start, latest));
    let rows = normalize(&recent, fx)?;

    let mut totals: BTreeMap<MonthPeriod, MonthlyTotals> = window
        .iter()
        .map(|m| (*m, MonthlyTotals::default()))
        .collect();
    for row in &rows {
        if let Some(slot) = totals.get_mut(&row.month_period) {
            slot.add(row);
        }
    }

    let points = totals
        .into_iter()
        .map(|(month, t)| {
            let value = match metric {
                Metric::GrossMargin => {
                    if t.revenue > 0.0 {
                        (t.revenue - t.cogs) / t.revenue * 100.0
                    } else {
                        0.0
                    }
                }
                Metric::Ebitda => t.revenue - t.cogs - t.opex,
            };
            TrendPoint {
                month,
                label: month.label(),
                value,
            }
        })
        .collect();

    Ok(Some(MetricTrend { metric, points }))
}

/// USD opex for one month grouped by subcategory, largest first.
pub fn opex_breakdown(
    actuals: &TransactionTable,
    fx: &FxRates,
    month_name: &str,
    year: i32,
) -> Result<Option<OpexBreakdown>> {
    let month = MonthPeriod::from_month_name(month_name, year)?;

    let opex = actuals.filtered(|r| r.category.is_under(OPEX) && r.month_period == month);
    if opex.is_empty() {
        debug!("No opex rows for {}", month);
        return Ok(None);
    }

    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
    for row in normalize(&opex, fx)? {
        let category = row.category.subcategory().unwrap_or_default().to_string();
        *by_category.entry(category).or_insert(0.0) += row.amount_usd;
    }

    let mut lines: Vec<OpexLine> = by_category
        .into_iter()
        .map(|(category, amount_usd)| OpexLine {
            category,
            amount_usd,
        })
        .collect();
    lines.sort_by(|a, b| b.amount_usd.total_cmp(&a.amount_usd));

    Ok(Some(OpexBreakdown { month, lines }))
}

/// Months of cash left at the average net burn of the trailing
/// [`RUNWAY_WINDOW_MONTHS`] months of actuals.
///
/// The average is taken over the months in the window that have rows. When
/// the business is breakeven or better the runway is infinite and the cash
/// table is not consulted.
pub fn cash_runway(
    actuals: &TransactionTable,
    cash: &[CashRow],
    fx: &FxRates,
) -> Result<CashRunway> {
    let latest = actuals.latest_month().ok_or_else(|| {
        CopilotError::InsufficientData("no actuals to calculate net burn from".to_string())
    })?;
    let start = latest.minus_months(RUNWAY_WINDOW_MONTHS - 1);

    let recent = actuals.filtered(|r| in_range(r.month_period, start, latest));
    if recent.is_empty() {
        return Err(CopilotError::InsufficientData(format!(
            "no actuals between {} and {}",
            start, latest
        )));
    }

    let mut totals: BTreeMap<MonthPeriod, MonthlyTotals> = BTreeMap::new();
    for row in normalize(&recent, fx)? {
        totals.entry(row.month_period).or_default().add(&row);
    }

    let window: Vec<MonthlyCashFlow> = totals
        .into_iter()
        .map(|(month, t)| {
            let expenses = t.cogs + t.opex;
            MonthlyCashFlow {
                month,
                income: t.revenue,
                expenses,
                net_flow: t.revenue - expenses,
            }
        })
        .collect();

    let avg_net_flow = window.iter().map(|m| m.net_flow).sum::<f64>() / window.len() as f64;
    let avg_burn = -avg_net_flow;

    debug!(
        "Average burn over {} month(s) ending {}: {:.2}",
        window.len(),
        latest,
        avg_burn
    );

    if avg_burn <= 0.0 {
        return Ok(CashRunway {
            runway_months: f64::INFINITY,
            latest_cash: 0.0,
            avg_burn,
            latest_cash_month: None,
            window,
        });
    }

    let latest_cash_month = cash
        .iter()
        .map(|r| r.month_period)
        .max()
        .ok_or(CopilotError::NoCashData)?;
    let latest_cash: f64 = cash
        .iter()
        .filter(|r| r.month_period == latest_cash_month)
        .map(|r| r.cash_usd)
        .sum();

    Ok(CashRunway {
        runway_months: latest_cash / avg_burn,
        latest_cash,
        avg_burn,
        latest_cash_month: Some(latest_cash_month),
        window,
    })
}

/// Cash balance for each of the last `n_months` months ending at the latest
/// month in the cash table. Rows sharing a month are summed.
pub fn cash_trend(cash: &[CashRow], n_months: u32) -> Result<Option<CashTrend>> {
    check_window(n_months)?;
    let Some(latest) = cash.iter().map(|r| r.month_period).max() else {
        return Ok(None);
    };
    let window = latest.trailing_window(n_months);
    let Some(&start) = window.first() else {
        return Ok(None);
    };

    let mut balances: BTreeMap<MonthPeriod, f64> = window.iter().map(|m| (*m, 0.0)).collect();
    for row in cash.iter().filter(|r| in_range(r.month_period, start, latest)) {
        if let Some(balance) = balances.get_mut(&row.month_period) {
            *balance += row.cash_usd;
        }
    }

    Ok(Some(CashTrend {
        points: balances
            .into_iter()
            .map(|(month, cash_usd)| CashPoint {
                month,
                label: month.label(),
                cash_usd,
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FxRow, TransactionRow};

    fn m(year: i32, month: u32) -> MonthPeriod {
        MonthPeriod::new(year, month).unwrap()
    }

    fn row(month: MonthPeriod, category: &str, amount: f64, currency: &str) -> TransactionRow {
        TransactionRow::new(month, category, amount, Some(currency))
    }

    fn actuals() -> TransactionTable {
        TransactionTable::new(
            true,
            vec![
                row(m(2025, 6), "revenue", 2000.0, "USD"),
                row(m(2025, 6), "cogs", 800.0, "USD"),
                row(m(2025, 5), "revenue", 1800.0, "CAD"),
                row(m(2025, 5), "cogs", 700.0, "CAD"),
                row(m(2025, 4), "revenue", 1600.0, "USD"),
                row(m(2025, 4), "cogs", 600.0, "USD"),
            ],
        )
    }

    fn budget() -> TransactionTable {
        TransactionTable::new(true, vec![row(m(2025, 6), "revenue", 1900.0, "USD")])
    }

    fn fx() -> FxRates {
        FxRates::new(vec![FxRow {
            month_period: m(2025, 5),
            currency: "CAD".to_string(),
            rate_to_usd: 1.25,
        }])
    }

    fn cash() -> Vec<CashRow> {
        vec![CashRow {
            month_period: m(2025, 6),
            cash_usd: 5000.0,
        }]
    }

    #[test]
    fn test_revenue_vs_budget() {
        let result = revenue_vs_budget(&actuals(), &budget(), &fx(), "June", 2025)
            .unwrap()
            .unwrap();
        assert_eq!(result.actual, 2000.0);
        assert_eq!(result.budget, 1900.0);
        assert_eq!(result.variance(), 100.0);
    }

    #[test]
    fn test_revenue_vs_budget_with_fx_conversion() {
        let result = revenue_vs_budget(&actuals(), &budget(), &fx(), "May", 2025)
            .unwrap()
            .unwrap();
        assert!((result.actual - 1440.0).abs() < 1e-9);
        assert_eq!(result.budget, 0.0);
    }

    #[test]
    fn test_revenue_vs_budget_no_data_and_bad_month() {
        let none = revenue_vs_budget(&actuals(), &budget(), &fx(), "January", 2025).unwrap();
        assert!(none.is_none());

        let err = revenue_vs_budget(&actuals(), &budget(), &fx(), "Juneteenth", 2025);
        assert!(matches!(err, Err(CopilotError::InvalidMonth(_))));
    }

    #[test]
    fn test_gross_margin_trend_fills_every_month() {
        let trend = financial_metric_trend(&actuals(), &fx(), Metric::GrossMargin, 6)
            .unwrap()
            .unwrap();

        assert_eq!(trend.points.len(), 6);
        let labels: Vec<&str> = trend.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Jan 2025", "Feb 2025", "Mar 2025", "Apr 2025", "May 2025", "Jun 2025"]
        );
        // no revenue -> 0
        assert_eq!(trend.points[0].value, 0.0);
        assert_eq!(trend.points[2].value, 0.0);
        // April: (1600 - 600) / 1600
        assert!((trend.points[3].value - 62.5).abs() < 1e-9);
        // June: (2000 - 800) / 2000
        assert!((trend.points[5].value - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_ebitda_trend_subtracts_opex() {
        let mut table = actuals();
        table.rows.push(row(m(2025, 6), "Opex:Payroll", 300.0, "USD"));
        table.rows.push(row(m(2025, 6), "opex:rent", 100.0, "USD"));

        let trend = financial_metric_trend(&table, &fx(), Metric::Ebitda, 2)
            .unwrap()
            .unwrap();
        assert_eq!(trend.points.len(), 2);
        assert_eq!(trend.points[0].month, m(2025, 5));
        // May: 1440 - 560
        assert!((trend.points[0].value - 880.0).abs() < 1e-9);
        // June: 2000 - 800 - 400
        assert!((trend.points[1].value - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_on_empty_actuals_is_none() {
        let empty = TransactionTable::default();
        assert!(financial_metric_trend(&empty, &fx(), Metric::Ebitda, 3)
            .unwrap()
            .is_none());
        assert!(financial_metric_trend(&actuals(), &fx(), Metric::Ebitda, 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_opex_breakdown_groups_and_sorts() {
        let mut table = actuals();
        table.rows.push(row(m(2025, 6), "Opex:Travel", 150.0, "USD"));
        table.rows.push(row(m(2025, 6), "opex:Payroll", 900.0, "USD"));
        table.rows.push(row(m(2025, 6), "OPEX:Travel", 50.0, "USD"));
        table.rows.push(row(m(2025, 5), "opex:Rent", 999.0, "USD"));

        let breakdown = opex_breakdown(&table, &fx(), "June", 2025).unwrap().unwrap();
        assert_eq!(
            breakdown.lines,
            vec![
                OpexLine {
                    category: "Payroll".to_string(),
                    amount_usd: 900.0
                },
                OpexLine {
                    category: "Travel".to_string(),
                    amount_usd: 200.0
                },
            ]
        );
        assert_eq!(breakdown.total(), 1100.0);
    }

    #[test]
    fn test_opex_breakdown_without_opex_rows_is_none() {
        let result = opex_breakdown(&actuals(), &fx(), "June", 2025).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_cash_runway_profitable_is_infinite() {
        // June 1200, May 880, April 1000 net inflow
        let runway = cash_runway(&actuals(), &cash(), &fx()).unwrap();
        assert!(runway.is_infinite());
        assert!(runway.avg_burn < 0.0);
        assert_eq!(runway.latest_cash, 0.0);
        assert!((runway.avg_burn + 3080.0 / 3.0).abs() < 1e-9);
        assert_eq!(runway.window.len(), 3);
    }

    #[test]
    fn test_cash_runway_with_burn() {
        let mut table = actuals();
        table.rows.push(row(m(2025, 6), "opex:payroll", 4000.0, "USD"));
        table.rows.push(row(m(2025, 5), "opex:payroll", 4000.0, "USD"));
        table.rows.push(row(m(2025, 4), "opex:payroll", 4000.0, "USD"));
        // an older month outside the window must not count
        table.rows.push(row(m(2025, 1), "revenue", 1_000_000.0, "USD"));

        let cash = vec![
            CashRow {
                month_period: m(2025, 5),
                cash_usd: 1.0,
            },
            CashRow {
                month_period: m(2025, 6),
                cash_usd: 6000.0,
            },
            CashRow {
                month_period: m(2025, 6),
                cash_usd: 3000.0,
            },
        ];

        let runway = cash_runway(&table, &cash, &fx()).unwrap();
        let expected_burn = 4000.0 - 3080.0 / 3.0;
        assert!((runway.avg_burn - expected_burn).abs() < 1e-9);
        assert_eq!(runway.latest_cash, 9000.0);
        assert_eq!(runway.runway_months, runway.latest_cash / runway.avg_burn);
        assert_eq!(runway.latest_cash_month, Some(m(2025, 6)));
    }

    #[test]
    fn test_cash_runway_errors() {
        let empty = TransactionTable::default();
        assert!(matches!(
            cash_runway(&empty, &cash(), &fx()),
            Err(CopilotError::InsufficientData(_))
        ));

        let burning = TransactionTable::new(
            false,
            vec![TransactionRow::new(m(2025, 6), "opex:rent", 100.0, None)],
        );
        assert!(matches!(
            cash_runway(&burning, &[], &fx()),
            Err(CopilotError::NoCashData)
        ));
    }

    #[test]
    fn test_cash_trend_window() {
        let cash = vec![
            CashRow {
                month_period: m(2024, 11),
                cash_usd: 100.0,
            },
            CashRow {
                month_period: m(2025, 1),
                cash_usd: 300.0,
            },
            CashRow {
                month_period: m(2025, 1),
                cash_usd: 50.0,
            },
        ];
        let trend = cash_trend(&cash, 2).unwrap().unwrap();
        assert_eq!(trend.points.len(), 2);
        assert_eq!(trend.points[0].label, "Dec 2024");
        assert_eq!(trend.points[0].cash_usd, 0.0);
        assert_eq!(trend.points[1].cash_usd, 350.0);

        assert!(cash_trend(&[], 6).unwrap().is_none());
    }

    #[test]
    fn test_oversized_windows_are_rejected() {
        let too_long = MAX_TREND_MONTHS + 1;
        assert!(matches!(
            financial_metric_trend(&actuals(), &fx(), Metric::Ebitda, u32::MAX),
            Err(CopilotError::WindowTooLarge { requested, .. }) if requested == u32::MAX
        ));
        assert!(matches!(
            cash_trend(&[], too_long),
            Err(CopilotError::WindowTooLarge { max, .. }) if max == MAX_TREND_MONTHS
        ));

        let trend = financial_metric_trend(&actuals(), &fx(), Metric::Ebitda, MAX_TREND_MONTHS)
            .unwrap()
            .unwrap();
        assert_eq!(trend.points.len(), MAX_TREND_MONTHS as usize);
    }
}
