use crate::error::{CopilotError, Result};
use crate::fx::{FxMode, FxRates};
use crate::period::MonthPeriod;
use crate::schema::{CashRow, FinancialTables, FxRow, TransactionRow, TransactionTable};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const ACTUALS: &str = "actuals";
pub const BUDGET: &str = "budget";
pub const CASH: &str = "cash";
pub const FX: &str = "fx";

pub const TABLE_NAMES: [&str; 4] = [ACTUALS, BUDGET, CASH, FX];

/// Columns every row of `table` must carry.
pub fn required_columns(table: &str) -> &'static [&'static str] {
    match table {
        ACTUALS | BUDGET => &["month", "account_category", "amount"],
        CASH => &["month", "cash_usd"],
        FX => &["month", "currency", "rate_to_usd"],
        _ => &["month"],
    }
}

/// A table as read from the source, before any typing: a header row and
/// text cells, `None` for empty cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.trim() == name)
    }

    pub fn require(&self, name: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| CopilotError::SchemaError {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .and_then(|cell| cell.as_deref())
    }

    fn month_at(&self, row: usize, column: usize) -> Result<MonthPeriod> {
        let value = self.cell(row, column).ok_or_else(|| self.invalid(row, "month", ""))?;
        MonthPeriod::parse(value).map_err(|_| self.invalid(row, "month", value))
    }

    /// Empty cells read as 0.
    fn amount_at(&self, row: usize, column: usize, name: &str) -> Result<f64> {
        match self.cell(row, column) {
            None => Ok(0.0),
            Some(text) => parse_number(text).ok_or_else(|| self.invalid(row, name, text)),
        }
    }

    fn invalid(&self, row: usize, column: &str, value: &str) -> CopilotError {
        CopilotError::InvalidValue {
            table: self.name.clone(),
            row: row + 1,
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Anything that can hand back the four named tables. The calculators only
/// ever see the typed tables built by [`load_tables`], so a source can be a
/// directory of CSVs, a single JSON workbook, or anything else.
pub trait DataSource {
    fn describe(&self) -> String;

    fn exists(&self) -> bool;

    fn read_table(&self, name: &str) -> Result<RawTable>;

    fn read_tables(&self, names: &[&str]) -> Result<Vec<RawTable>> {
        names.iter().map(|name| self.read_table(name)).collect()
    }
}

/// A directory holding `actuals.csv`, `budget.csv`, `cash.csv` and `fx.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DataSource for CsvDirectorySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    fn read_table(&self, name: &str) -> Result<RawTable> {
        let path = self.dir.join(format!("{}.csv", name));
        if !path.is_file() {
            return Err(CopilotError::MissingTable(name.to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let cells = (0..columns.len())
                .map(|idx| {
                    record
                        .get(idx)
                        .filter(|cell| !cell.is_empty())
                        .map(str::to_string)
                })
                .collect();
            rows.push(cells);
        }

        debug!("Read {} rows from {}", rows.len(), path.display());

        Ok(RawTable {
            name: name.to_string(),
            columns,
            rows,
        })
    }
}

/// One JSON file shaped like a workbook: each table is a top-level key
/// holding an array of row objects.
///
/// ```json
/// { "actuals": [{ "month": "2025-06-30", "account_category": "revenue", "amount": 2000, "currency": "USD" }],
///   "budget": [], "cash": [], "fx": [] }
/// ```
#[derive(Debug, Clone)]
pub struct JsonWorkbookSource {
    path: PathBuf,
}

impl JsonWorkbookSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_workbook(&self) -> Result<Value> {
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn sheet_to_table(name: &str, sheet: &Value) -> Result<RawTable> {
    let records = sheet
        .as_array()
        .ok_or_else(|| CopilotError::MissingTable(name.to_string()))?;

    // An empty sheet has no keys to read the header from.
    if records.is_empty() {
        return Ok(RawTable {
            name: name.to_string(),
            columns: required_columns(name).iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        });
    }

    let mut columns: Vec<String> = Vec::new();
    for record in records {
        if let Some(object) = record.as_object() {
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| CopilotError::InvalidValue {
            table: name.to_string(),
            row: idx + 1,
            column: "<row>".to_string(),
            value: record.to_string(),
        })?;

        let cells = columns
            .iter()
            .map(|column| match object.get(column) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.trim().is_empty() => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
            })
            .collect();
        rows.push(cells);
    }

    Ok(RawTable {
        name: name.to_string(),
        columns,
        rows,
    })
}

impl DataSource for JsonWorkbookSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read_table(&self, name: &str) -> Result<RawTable> {
        let workbook = self.read_workbook()?;
        let sheet = workbook
            .get(name)
            .ok_or_else(|| CopilotError::MissingTable(name.to_string()))?;
        sheet_to_table(name, sheet)
    }

    fn read_tables(&self, names: &[&str]) -> Result<Vec<RawTable>> {
        let workbook = self.read_workbook()?;
        names
            .iter()
            .map(|name| {
                let sheet = workbook
                    .get(*name)
                    .ok_or_else(|| CopilotError::MissingTable(name.to_string()))?;
                sheet_to_table(name, sheet)
            })
            .collect()
    }
}

/// Picks a source for `path`: a directory is read as CSV files, a file as a
/// JSON workbook.
pub fn open_source(path: &Path) -> Result<Box<dyn DataSource>> {
    if path.is_dir() {
        Ok(Box::new(CsvDirectorySource::new(path)))
    } else if path.is_file() {
        Ok(Box::new(JsonWorkbookSource::new(path)))
    } else {
        Err(CopilotError::DataSourceMissing(path.display().to_string()))
    }
}

fn build_transactions(raw: &RawTable) -> Result<TransactionTable> {
    let month_col = raw.require("month")?;
    let category_col = raw.require("account_category")?;
    let amount_col = raw.require("amount")?;
    let currency_col = raw.column("currency");

    let mut rows = Vec::with_capacity(raw.rows.len());
    for idx in 0..raw.rows.len() {
        let month_period = raw.month_at(idx, month_col)?;
        let category = raw.cell(idx, category_col).unwrap_or_default();
        let amount = raw.amount_at(idx, amount_col, "amount")?;
        let currency = currency_col
            .and_then(|col| raw.cell(idx, col))
            .map(str::trim)
            .filter(|c| !c.is_empty());

        rows.push(TransactionRow::new(month_period, category, amount, currency));
    }

    Ok(TransactionTable::new(currency_col.is_some(), rows))
}

fn build_cash(raw: &RawTable) -> Result<Vec<CashRow>> {
    let month_col = raw.require("month")?;
    let cash_col = raw.require("cash_usd")?;

    (0..raw.rows.len())
        .map(|idx| {
            Ok(CashRow {
                month_period: raw.month_at(idx, month_col)?,
                cash_usd: raw.amount_at(idx, cash_col, "cash_usd")?,
            })
        })
        .collect()
}

fn build_fx(raw: &RawTable) -> Result<Vec<FxRow>> {
    let month_col = raw.require("month")?;
    let currency_col = raw.require("currency")?;
    let rate_col = raw.require("rate_to_usd")?;

    let mut rows = Vec::with_capacity(raw.rows.len());
    for idx in 0..raw.rows.len() {
        let month_period = raw.month_at(idx, month_col)?;
        let Some(currency) = raw.cell(idx, currency_col) else {
            continue;
        };
        // A blank rate behaves like no rate at all.
        let Some(rate_text) = raw.cell(idx, rate_col) else {
            continue;
        };
        let rate_to_usd = parse_number(rate_text)
            .filter(|rate| *rate > 0.0)
            .ok_or_else(|| raw.invalid(idx, "rate_to_usd", rate_text))?;

        rows.push(FxRow {
            month_period,
            currency: currency.trim().to_string(),
            rate_to_usd,
        });
    }

    Ok(rows)
}

/// Reads and validates the four tables. Every call goes back to the source;
/// nothing is cached between calls.
pub fn load_tables(source: &dyn DataSource, fx_mode: FxMode) -> Result<FinancialTables> {
    if !source.exists() {
        return Err(CopilotError::DataSourceMissing(source.describe()));
    }

    let raw = source.read_tables(&TABLE_NAMES)?;
    for table in &raw {
        table.require("month")?;
    }

    let [actuals_raw, budget_raw, cash_raw, fx_raw] = raw.as_slice() else {
        return Err(CopilotError::InsufficientData(format!(
            "expected {} tables from {}, got {}",
            TABLE_NAMES.len(),
            source.describe(),
            raw.len()
        )));
    };

    let tables = FinancialTables {
        actuals: build_transactions(actuals_raw)?,
        budget: build_transactions(budget_raw)?,
        cash: build_cash(cash_raw)?,
        fx: FxRates::new(build_fx(fx_raw)?).with_mode(fx_mode),
    };

    info!(
        "Loaded data from {}: {} actuals, {} budget, {} cash, {} fx rows",
        source.describe(),
        tables.actuals.rows.len(),
        tables.budget.rows.len(),
        tables.cash.len(),
        tables.fx.rows.len()
    );

    Ok(tables)
}

pub fn load_from_path(path: &Path, fx_mode: FxMode) -> Result<FinancialTables> {
    let source = open_source(path)?;
    load_tables(source.as_ref(), fx_mode)
}
