// sopguard-core/src/domain/coercion.rs
//
// Safe numeric and date parsing for cells coming out of spreadsheets
// ("1,200", "10/15/2025", Excel serials...). Every function here is total:
// unparseable input becomes `None`, never an error.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::error::ToolError;
use crate::domain::table::{Table, Value};

/// Days between the Excel epoch (1899-12-30, leap-year bug included) and a serial.
const EXCEL_SERIAL_MAX: f64 = 2_958_465.0; // 9999-12-31

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

// Month-first before day-first: "03/04/2025" is March 4th.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%d %b, %Y",
    "%d %B, %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%Y%m%d",
];

/// Parses one cell as a decimal number, ignoring thousands separators and
/// whitespace. Dates, booleans and nulls are not numbers.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if n.is_finite() => Some(*n),
        Value::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Numeric view of a column, one entry per row. Missing stays missing
/// (not zero) so range checks can decide how to treat it.
pub fn coerce_numeric(table: &Table, column: &str) -> Result<Vec<Option<f64>>, ToolError> {
    Ok(table.column(column)?.map(parse_number).collect())
}

pub fn parse_date_safe(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Number(n) => from_excel_serial(*n),
        Value::Text(s) => parse_date_text(s.trim()),
        Value::Null | Value::Bool(_) => None,
    }
}

/// Midnight of the given day, the granularity used by date comparisons.
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(1.0..=EXCEL_SERIAL_MAX).contains(&serial) {
        return None;
    }
    let epoch = start_of_day(NaiveDate::from_ymd_opt(1899, 12, 30)?);
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}

fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(start_of_day)
        })
}

/// Text form used by pattern checks. Integral numbers print without ".0".
pub fn display_text(value: &Value) -> String {
    value.to_string()
}
