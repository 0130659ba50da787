use crate::metrics::{CashTrend, MetricTrend, OpexBreakdown, RevenueVsBudget};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const ACTUAL_COLOR: &str = "#1f77b4";
pub const BUDGET_COLOR: &str = "#ff7f0e";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChartSeries {
    pub name: String,
    pub values: Vec<f64>,
    #[schemars(description = "Hex color for the series, e.g. '#1f77b4'")]
    pub color: Option<String>,
}

/// Everything an external renderer needs to draw a chart. No pixels are
/// produced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    #[schemars(description = "Grouped bar chart: one group per category, one bar per series")]
    Bar {
        title: String,
        y_axis_title: String,
        categories: Vec<String>,
        series: Vec<ChartSeries>,
    },

    #[schemars(description = "Line chart with markers over ordered x labels")]
    Line {
        title: String,
        x_axis_title: String,
        y_axis_title: String,
        x_labels: Vec<String>,
        series: ChartSeries,
        #[schemars(description = "Suffix for y-axis tick labels, e.g. '%'")]
        y_tick_suffix: Option<String>,
    },

    #[schemars(description = "Donut chart; hole is the inner radius fraction (0 for a full pie)")]
    Pie {
        title: String,
        labels: Vec<String>,
        values: Vec<f64>,
        hole: f64,
    },
}

impl ChartSpec {
    pub fn title(&self) -> &str {
        match self {
            ChartSpec::Bar { title, .. }
            | ChartSpec::Line { title, .. }
            | ChartSpec::Pie { title, .. } => title,
        }
    }

    pub fn revenue_vs_budget(data: &RevenueVsBudget) -> Self {
        ChartSpec::Bar {
            title: format!(
                "Revenue vs. Budget for {} {}",
                data.month.month_name(),
                data.month.year()
            ),
            y_axis_title: "Amount (USD)".to_string(),
            categories: vec!["Revenue".to_string()],
            series: vec![
                ChartSeries {
                    name: "Actual".to_string(),
                    values: vec![data.actual],
                    color: Some(ACTUAL_COLOR.to_string()),
                },
                ChartSeries {
                    name: "Budget".to_string(),
                    values: vec![data.budget],
                    color: Some(BUDGET_COLOR.to_string()),
                },
            ],
        }
    }

    pub fn metric_trend(trend: &MetricTrend) -> Self {
        let caption = trend.metric.chart_caption();
        let y_tick_suffix = caption.contains('%').then(|| "%".to_string());
        ChartSpec::Line {
            title: format!("{} Trend", caption),
            x_axis_title: "Month".to_string(),
            y_axis_title: caption.clone(),
            x_labels: trend.points.iter().map(|p| p.label.clone()).collect(),
            series: ChartSeries {
                name: caption,
                values: trend.points.iter().map(|p| p.value).collect(),
                color: Some(ACTUAL_COLOR.to_string()),
            },
            y_tick_suffix,
        }
    }

    pub fn opex_breakdown(breakdown: &OpexBreakdown) -> Self {
        ChartSpec::Pie {
            title: format!(
                "Opex Breakdown for {} {}",
                breakdown.month.month_name(),
                breakdown.month.year()
            ),
            labels: breakdown.lines.iter().map(|l| l.category.clone()).collect(),
            values: breakdown.lines.iter().map(|l| l.amount_usd).collect(),
            hole: 0.3,
        }
    }

    pub fn cash_trend(trend: &CashTrend) -> Self {
        ChartSpec::Line {
            title: format!("Cash Balance Trend (Last {} Months)", trend.points.len()),
            x_axis_title: "Month".to_string(),
            y_axis_title: "Cash (USD)".to_string(),
            x_labels: trend.points.iter().map(|p| p.label.clone()).collect(),
            series: ChartSeries {
                name: "Cash (USD)".to_string(),
                values: trend.points.iter().map(|p| p.cash_usd).collect(),
                color: Some(ACTUAL_COLOR.to_string()),
            },
            y_tick_suffix: None,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ChartSpec)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
