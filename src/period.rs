use crate::error::{CopilotError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A calendar month key (year + month), the grain every table is filtered,
/// grouped and windowed on.
///
/// Ordering is chronological. Arithmetic moves by whole calendar months, so
/// `2025-03` minus one month is always `2025-02` regardless of day counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthPeriod {
    year: i32,
    month: u32,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(CopilotError::DateError(format!(
                "Invalid month {}: must be between 1 and 12",
                month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Resolves a full month name ("June", case-insensitive) and a year.
    pub fn from_month_name(month_name: &str, year: i32) -> Result<Self> {
        let wanted = month_name.trim();
        MONTH_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(wanted))
            .map(|idx| Self {
                year,
                month: idx as u32 + 1,
            })
            .ok_or_else(|| CopilotError::InvalidMonth(month_name.to_string()))
    }

    /// Parses the text of a `month` cell. Accepts full dates, timestamps and
    /// bare `YYYY-MM` values; the day is discarded.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();

        for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
                return Ok(Self::from_date(date));
            }
        }

        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
                return Ok(Self::from_date(ts.date()));
            }
        }

        // "YYYY-MM"
        let start_str = format!("{}-01", value);
        NaiveDate::parse_from_str(&start_str, "%Y-%m-%d")
            .map(Self::from_date)
            .map_err(|_| {
                CopilotError::DateError(format!(
                    "Invalid month value: '{}'. Expected YYYY-MM or YYYY-MM-DD",
                    value
                ))
            })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// Short label used on chart axes, e.g. "Jun 2025".
    pub fn label(&self) -> String {
        format!("{} {}", &self.month_name()[..3], self.year)
    }

    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn minus_months(self, n: u32) -> Self {
        Self::from_ordinal(self.ordinal() - n as i64)
    }

    pub fn plus_months(self, n: u32) -> Self {
        Self::from_ordinal(self.ordinal() + n as i64)
    }

    pub fn months_until(&self, other: MonthPeriod) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// The `n` contiguous months ending at `self` (inclusive), oldest first.
    pub fn trailing_window(self, n: u32) -> Vec<MonthPeriod> {
        if n == 0 {
            return Vec::new();
        }
        let start = self.minus_months(n - 1);
        (0..n).map(|offset| start.plus_months(offset)).collect()
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthPeriod {
    type Err = CopilotError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MonthPeriod {
    type Error = CopilotError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MonthPeriod> for String {
    fn from(period: MonthPeriod) -> Self {
        period.to_string()
    }
}
