//! Keyword router: turns a free-text question into one calculator call and a
//! formatted answer.
//!
//! Intents are tested in a fixed order and the first match wins:
//!
//! 1. "revenue" and "budget" -> revenue vs budget (needs month + year)
//! 2. "gross margin" or "ebitda", plus "trend" -> metric trend
//! 3. "opex" and ("breakdown" or "category") -> opex breakdown (needs month + year)
//! 4. "cash runway" -> cash runway
//!
//! Anything else gets [`FALLBACK_TEXT`].

use crate::chart::ChartSpec;
use crate::config::{CopilotConfig, DEFAULT_TREND_MONTHS, MAX_TREND_MONTHS};
use crate::error::Result;
use crate::metrics::{
    cash_runway, financial_metric_trend, opex_breakdown, revenue_vs_budget, RUNWAY_WINDOW_MONTHS,
};
use crate::schema::{FinancialTables, Metric};
use crate::utils::{capitalize, format_millions, format_thousands};
use log::{debug, warn};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const FALLBACK_TEXT: &str = "Sorry, I can't answer that question. Please try one of the sample questions or ask about: \n- Revenue vs. Budget (for a specific month) \n- Gross Margin or EBITDA trend (for the last X months) \n- Opex breakdown (for a specific month) \n- Cash Runway";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Response {
    #[schemars(description = "Markdown answer shown to the user")]
    pub text: String,
    #[schemars(description = "Chart for the external renderer, if the answer has one")]
    pub chart: Option<ChartSpec>,
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chart: None,
        }
    }

    pub fn with_chart(text: impl Into<String>, chart: ChartSpec) -> Self {
        Self {
            text: text.into(),
            chart: Some(chart),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    RevenueVsBudget,
    MetricTrend,
    OpexBreakdown,
    CashRunway,
}

/// Date and count entities pulled out of a question, shared by every intent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryEntities {
    /// Capitalized full month name, e.g. "June".
    pub month_name: Option<String>,
    pub year: Option<i32>,
    /// "N months" count, if the question gave one.
    pub trailing_months: Option<u32>,
}

fn month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(january|february|march|april|may|june|july|august|september|october|november|december)",
        )
        .expect("month regex")
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})").expect("year regex"))
}

fn months_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+months").expect("months regex"))
}

/// Extracts entities from an already lowercased question. `default_year`
/// (the latest year in the actuals) fills in a missing year.
pub fn extract_entities(query_lower: &str, default_year: Option<i32>) -> QueryEntities {
    let month_name = month_re()
        .captures(query_lower)
        .map(|caps| capitalize(&caps[1]));

    let year = year_re()
        .captures(query_lower)
        .and_then(|caps| caps[1].parse::<i32>().ok())
        .or(default_year);

    // Only digits can match, so a failed parse means the count overflowed.
    let trailing_months = months_count_re()
        .captures(query_lower)
        .map(|caps| caps[1].parse::<u32>().unwrap_or(u32::MAX));

    QueryEntities {
        month_name,
        year,
        trailing_months,
    }
}

type Handler = fn(&Router, &FinancialTables, &str, &QueryEntities) -> Result<Response>;

struct IntentRule {
    intent: Intent,
    matches: fn(&str) -> bool,
    handler: Handler,
}

fn asks_revenue_vs_budget(q: &str) -> bool {
    q.contains("revenue") && q.contains("budget")
}

fn asks_metric_trend(q: &str) -> bool {
    (q.contains("gross margin") || q.contains("ebitda")) && q.contains("trend")
}

fn asks_opex_breakdown(q: &str) -> bool {
    q.contains("opex") && (q.contains("breakdown") || q.contains("category"))
}

fn asks_cash_runway(q: &str) -> bool {
    q.contains("cash runway")
}

static RULES: [IntentRule; 4] = [
    IntentRule {
        intent: Intent::RevenueVsBudget,
        matches: asks_revenue_vs_budget,
        handler: Router::answer_revenue_vs_budget,
    },
    IntentRule {
        intent: Intent::MetricTrend,
        matches: asks_metric_trend,
        handler: Router::answer_metric_trend,
    },
    IntentRule {
        intent: Intent::OpexBreakdown,
        matches: asks_opex_breakdown,
        handler: Router::answer_opex_breakdown,
    },
    IntentRule {
        intent: Intent::CashRunway,
        matches: asks_cash_runway,
        handler: Router::answer_cash_runway,
    },
];

/// The first intent whose keywords appear in `query`, if any.
pub fn classify(query: &str) -> Option<Intent> {
    let query_lower = query.to_lowercase();
    RULES
        .iter()
        .find(|rule| (rule.matches)(&query_lower))
        .map(|rule| rule.intent)
}

#[derive(Debug, Clone)]
pub struct Router {
    default_trend_months: u32,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_MONTHS)
    }
}

impl Router {
    pub fn new(default_trend_months: u32) -> Self {
        Self {
            default_trend_months,
        }
    }

    pub fn from_config(config: &CopilotConfig) -> Self {
        Self::new(config.default_trend_months)
    }

    /// Answers `query`, propagating calculator failures to the caller.
    pub fn try_route(&self, tables: &FinancialTables, query: &str) -> Result<Response> {
        let query_lower = query.to_lowercase();
        let entities = extract_entities(&query_lower, tables.latest_actuals_year());

        match RULES.iter().find(|rule| (rule.matches)(&query_lower)) {
            Some(rule) => {
                debug!("Routing {:?} with {:?}", rule.intent, entities);
                (rule.handler)(self, tables, &query_lower, &entities)
            }
            None => {
                debug!("No intent matched: {}", query);
                Ok(Response::text(FALLBACK_TEXT))
            }
        }
    }

    /// Answers `query`; calculator failures are turned into a plain message.
    pub fn route(&self, tables: &FinancialTables, query: &str) -> Response {
        self.try_route(tables, query).unwrap_or_else(|e| {
            warn!("Query failed: {}", e);
            Response::text(e.to_string())
        })
    }

    fn answer_revenue_vs_budget(
        &self,
        tables: &FinancialTables,
        _query: &str,
        entities: &QueryEntities,
    ) -> Result<Response> {
        let (Some(month_name), Some(year)) = (&entities.month_name, entities.year) else {
            return Ok(Response::text(
                "Please specify a month and year for revenue vs. budget analysis.",
            ));
        };

        let Some(data) =
            revenue_vs_budget(&tables.actuals, &tables.budget, &tables.fx, month_name, year)?
        else {
            return Ok(Response::text(format!(
                "No revenue data found for {} {}.",
                month_name, year
            )));
        };

        let text = format!(
            "### Revenue vs. Budget for {} {}:\n- **Actual Revenue:** {}\n- **Budgeted Revenue:** {}\n- **Variance:** {}",
            month_name,
            year,
            format_millions(data.actual),
            format_millions(data.budget),
            format_millions(data.variance())
        );
        Ok(Response::with_chart(text, ChartSpec::revenue_vs_budget(&data)))
    }

    fn answer_metric_trend(
        &self,
        tables: &FinancialTables,
        query: &str,
        entities: &QueryEntities,
    ) -> Result<Response> {
        let metric = if query.contains("gross margin") {
            Metric::GrossMargin
        } else {
            Metric::Ebitda
        };
        let n_months = entities
            .trailing_months
            .unwrap_or(self.default_trend_months);
        if n_months > MAX_TREND_MONTHS {
            return Ok(Response::text(format!(
                "Please ask for a trend over at most {} months.",
                MAX_TREND_MONTHS
            )));
        }

        let Some(trend) = financial_metric_trend(&tables.actuals, &tables.fx, metric, n_months)?
        else {
            return Ok(Response::text(format!(
                "No actuals data found to compute the {} trend.",
                metric
            )));
        };

        Ok(Response::with_chart(
            format!("Here is the {} trend for the last {} months.", metric, n_months),
            ChartSpec::metric_trend(&trend),
        ))
    }

    fn answer_opex_breakdown(
        &self,
        tables: &FinancialTables,
        _query: &str,
        entities: &QueryEntities,
    ) -> Result<Response> {
        let (Some(month_name), Some(year)) = (&entities.month_name, entities.year) else {
            return Ok(Response::text(
                "Please specify a month and year for the Opex breakdown.",
            ));
        };

        let Some(breakdown) = opex_breakdown(&tables.actuals, &tables.fx, month_name, year)? else {
            return Ok(Response::text(format!(
                "No Opex data found for {} {}.",
                month_name, year
            )));
        };

        let text = format!(
            "Total Opex for {} {} was **{}**. Here is the breakdown by category.",
            month_name,
            year,
            format_millions(breakdown.total())
        );
        Ok(Response::with_chart(text, ChartSpec::opex_breakdown(&breakdown)))
    }

    fn answer_cash_runway(
        &self,
        tables: &FinancialTables,
        _query: &str,
        _entities: &QueryEntities,
    ) -> Result<Response> {
        let data = cash_runway(&tables.actuals, &tables.cash, &tables.fx)?;

        let text = if data.is_infinite() {
            format!(
                "### 💰 Cash Runway Analysis\nCongratulations! The company is profitable or cash-neutral based on the last {} months of data. Your average monthly net cash flow was **${}**.",
                RUNWAY_WINDOW_MONTHS,
                format_thousands(-data.avg_burn)
            )
        } else {
            format!(
                "### 💰 Cash Runway Analysis\n- **Current Cash Balance:** ${} USD\n- **Avg. {}-Month Net Burn:** ${} USD per month\n- **Estimated Cash Runway:** **{:.1} months**",
                format_thousands(data.latest_cash),
                RUNWAY_WINDOW_MONTHS,
                format_thousands(data.avg_burn),
                data.runway_months
            )
        };
        Ok(Response::text(text))
    }
}
