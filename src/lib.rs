//! # CFO Copilot
//!
//! A financial-analysis assistant over a company's monthly financial data.
//! Free-text questions are matched against a fixed set of keyword intents,
//! the requested metric is computed from four tables (actuals, budget, cash,
//! FX rates), and the answer comes back as markdown text plus an optional
//! chart description for an external renderer.
//!
//! ## Core Concepts
//!
//! - **Month periods**: every table is keyed by calendar month ([`MonthPeriod`])
//! - **USD normalization**: foreign-currency amounts are divided by the month's FX rate
//! - **Categories**: `account_category` strings like `"opex:travel"` are parsed into a [`CategoryKey`]
//! - **No hidden state**: every question reloads the data source and recomputes
//!
//! ## Supported questions
//!
//! - Revenue vs. budget for a month ("What was June 2025 revenue vs budget?")
//! - Gross margin or EBITDA trend ("Show Gross Margin % trend for the last 6 months")
//! - Opex breakdown by category ("Break down Opex by category for May 2025")
//! - Cash runway ("What is our cash runway right now?")
//!
//! ## Example
//!
//! ```rust,ignore
//! use cfo_copilot::*;
//!
//! let copilot = Copilot::new(CopilotConfig::with_data_source("fixtures/data.json"));
//! let response = copilot.answer("What was June 2025 revenue vs budget in USD?");
//! println!("{}", response.text);
//! ```

pub mod chart;
pub mod config;
pub mod conversation;
pub mod error;
pub mod fx;
pub mod ingestion;
pub mod metrics;
pub mod period;
pub mod report;
pub mod router;
pub mod schema;
pub mod utils;

pub use chart::{ChartSeries, ChartSpec};
pub use config::CopilotConfig;
pub use conversation::{ChatMessage, Conversation, Role, SAMPLE_QUESTIONS};
pub use error::{CopilotError, Result};
pub use fx::{normalize, FxMode, FxRates, NormalizedRow};
pub use ingestion::{
    load_from_path, load_tables, open_source, CsvDirectorySource, DataSource, JsonWorkbookSource,
    RawTable,
};
pub use metrics::*;
pub use period::MonthPeriod;
pub use report::{MonthlyReport, ReportSection};
pub use router::{classify, extract_entities, Intent, QueryEntities, Response, Router};
pub use schema::*;

use log::error;

/// Entry point tying the loader, router and report together for one
/// configured data source.
#[derive(Debug, Clone)]
pub struct Copilot {
    config: CopilotConfig,
    router: Router,
}

impl Copilot {
    pub fn new(config: CopilotConfig) -> Self {
        let router = Router::from_config(&config);
        Self { config, router }
    }

    pub fn config(&self) -> &CopilotConfig {
        &self.config
    }

    /// Loads a fresh snapshot of the four tables.
    pub fn load(&self) -> Result<FinancialTables> {
        load_from_path(&self.config.data_source, self.config.fx_mode)
    }

    /// Answers a question, propagating load and calculation failures.
    pub fn try_answer(&self, query: &str) -> Result<Response> {
        let tables = self.load()?;
        self.router.try_route(&tables, query)
    }

    /// Answers a question. Failures are reported in the response text.
    pub fn answer(&self, query: &str) -> Response {
        match self.load() {
            Ok(tables) => self.router.route(&tables, query),
            Err(e) => {
                error!("Failed to load data: {}", e);
                Response::text(format!("Error loading data: {}", e))
            }
        }
    }

    /// Builds the monthly report for the latest month in the actuals.
    pub fn monthly_report(&self) -> Result<MonthlyReport> {
        let tables = self.load()?;
        MonthlyReport::build(&tables, &self.config)
    }
}

pub fn route_query(config: &CopilotConfig, query: &str) -> Response {
    Copilot::new(config.clone()).answer(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_is_reported_in_text() {
        let copilot = Copilot::new(CopilotConfig::with_data_source("/no/such/dir"));
        let response = copilot.answer("What is our cash runway right now?");
        assert_eq!(
            response.text,
            "Error loading data: The data source was not found at /no/such/dir"
        );
        assert!(response.chart.is_none());

        assert!(matches!(
            copilot.try_answer("cash runway"),
            Err(CopilotError::DataSourceMissing(_))
        ));
        assert!(matches!(
            copilot.monthly_report(),
            Err(CopilotError::DataSourceMissing(_))
        ));
    }

    #[test]
    fn test_route_query_uses_config() {
        let config = CopilotConfig::with_data_source("/no/such/file.json");
        let response = route_query(&config, "anything");
        assert!(response.text.starts_with("Error loading data:"));
    }
}
