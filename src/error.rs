use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("The data source was not found at {0}")]
    DataSourceMissing(String),

    #[error("Table '{0}' not found in the data source")]
    MissingTable(String),

    #[error("Column '{column}' not found in the '{table}' table")]
    SchemaError { table: String, column: String },

    #[error("Invalid value '{value}' in column '{column}' of the '{table}' table (row {row})")]
    InvalidValue {
        table: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("Invalid month name: '{0}'. Please use a full month name (e.g., 'June').")]
    InvalidMonth(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("No cash data available.")]
    NoCashData,

    #[error("Not enough recent financial data: {0}")]
    InsufficientData(String),

    #[error("Trend windows are limited to {max} months ({requested} requested)")]
    WindowTooLarge { requested: u32, max: u32 },

    #[error("No FX rate for {currency} in {month}")]
    MissingFxRate { currency: String, month: String },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CopilotError>;
