use crate::chart::ChartSpec;
use crate::config::CopilotConfig;
use crate::error::{CopilotError, Result};
use crate::metrics::{cash_trend, opex_breakdown, revenue_vs_budget};
use crate::period::MonthPeriod;
use crate::schema::FinancialTables;
use crate::utils::format_millions;
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const REPORT_TITLE: &str = "Monthly Financial Report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
    pub chart: Option<ChartSpec>,
}

/// The content of the monthly report for the latest month in the actuals.
/// Page layout and image embedding belong to whoever renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyReport {
    pub title: String,
    #[schemars(description = "Report month, e.g. 'June 2025'")]
    pub month: String,
    pub sections: Vec<ReportSection>,
}

impl MonthlyReport {
    pub fn build(tables: &FinancialTables, config: &CopilotConfig) -> Result<Self> {
        let latest = tables.latest_actuals_month().ok_or_else(|| {
            CopilotError::InsufficientData("no actuals to build a report from".to_string())
        })?;
        let month_name = latest.month_name();
        let year = latest.year();

        info!("Building monthly report for {}", latest);

        let sections = vec![
            revenue_section(tables, latest)?,
            opex_section(tables, latest)?,
            cash_section(tables, config.report_cash_trend_months)?,
        ];

        Ok(Self {
            title: REPORT_TITLE.to_string(),
            month: format!("{} {}", month_name, year),
            sections,
        })
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));

        for section in &self.sections {
            output.push_str(&format!("## {}\n\n", section.title));
            if !section.body.is_empty() {
                output.push_str(&section.body);
                output.push_str("\n\n");
            }
            if let Some(chart) = &section.chart {
                output.push_str(&format!("_Chart: {}_\n\n", chart.title()));
            }
        }

        output
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn revenue_section(tables: &FinancialTables, month: MonthPeriod) -> Result<ReportSection> {
    let title = format!(
        "Revenue vs. Budget - {} {}",
        month.month_name(),
        month.year()
    );

    let section = match revenue_vs_budget(
        &tables.actuals,
        &tables.budget,
        &tables.fx,
        month.month_name(),
        month.year(),
    )? {
        Some(data) => ReportSection {
            title,
            body: format!(
                "- Actual Revenue: {}\n- Budgeted Revenue: {}\n- Variance: {}",
                format_millions(data.actual),
                format_millions(data.budget),
                format_millions(data.variance())
            ),
            chart: Some(ChartSpec::revenue_vs_budget(&data)),
        },
        None => ReportSection {
            title,
            body: "No revenue data for this month.".to_string(),
            chart: None,
        },
    };
    Ok(section)
}

fn opex_section(tables: &FinancialTables, month: MonthPeriod) -> Result<ReportSection> {
    let title = format!("Opex Breakdown - {} {}", month.month_name(), month.year());

    let section = match opex_breakdown(&tables.actuals, &tables.fx, month.month_name(), month.year())? {
        Some(breakdown) => ReportSection {
            title,
            body: format!(
                "Total Opex for {} {} was {}.",
                month.month_name(),
                month.year(),
                format_millions(breakdown.total())
            ),
            chart: Some(ChartSpec::opex_breakdown(&breakdown)),
        },
        None => ReportSection {
            title,
            body: "No Opex data for this month.".to_string(),
            chart: None,
        },
    };
    Ok(section)
}

fn cash_section(tables: &FinancialTables, n_months: u32) -> Result<ReportSection> {
    let title = "Cash Balance Trend".to_string();
    let section = match cash_trend(&tables.cash, n_months)? {
        Some(trend) => ReportSection {
            title,
            body: String::new(),
            chart: Some(ChartSpec::cash_trend(&trend)),
        },
        None => ReportSection {
            title,
            body: "No cash data available.".to_string(),
            chart: None,
        },
    };
    Ok(section)
}
