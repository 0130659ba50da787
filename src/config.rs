use crate::error::Result;
use crate::fx::FxMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_SOURCE: &str = "fixtures/data.json";
pub const DEFAULT_TREND_MONTHS: u32 = 6;
/// Longest trend window a question or the config may ask for.
pub const MAX_TREND_MONTHS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    /// A directory of CSV tables or a JSON workbook file.
    pub data_source: PathBuf,
    pub fx_mode: FxMode,
    /// Used when a trend question does not say "N months".
    pub default_trend_months: u32,
    pub report_cash_trend_months: u32,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            data_source: PathBuf::from(DEFAULT_DATA_SOURCE),
            fx_mode: FxMode::Lenient,
            default_trend_months: DEFAULT_TREND_MONTHS,
            report_cash_trend_months: DEFAULT_TREND_MONTHS,
        }
    }
}

impl CopilotConfig {
    pub fn with_data_source(data_source: impl Into<PathBuf>) -> Self {
        Self {
            data_source: data_source.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
