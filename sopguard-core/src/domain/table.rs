// sopguard-core/src/domain/table.rs

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::domain::error::{DomainError, ToolError};

/// A loosely typed cell, as found in spreadsheets exported by the ERP.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Hashable identity used for grouping, joins and set membership.
    /// Null equals null, numbers compare by value.
    pub fn key(&self) -> CellKey {
        match self {
            Value::Null => CellKey::Null,
            Value::Text(s) => CellKey::Text(s.clone()),
            Value::Number(n) => {
                // -0.0 and 0.0 must land in the same bucket
                let n = if *n == 0.0 { 0.0 } else { *n };
                CellKey::Number(n.to_bits())
            }
            Value::Bool(b) => CellKey::Bool(*b),
            Value::Date(d) => CellKey::Date(*d),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Number(n) => number_to_json(*n),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Date(d) => JsonValue::String(format_date(d)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => f.write_str(&format_date(d)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Date(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Null,
    Text(String),
    Number(u64),
    Bool(bool),
    Date(NaiveDateTime),
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn format_date(d: &NaiveDateTime) -> String {
    if d.time() == NaiveTime::MIN {
        d.format("%Y-%m-%d").to_string()
    } else {
        d.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// In-memory rectangular dataset. Column names are unique, row order is
/// insertion order and is what "first N offending rows" refers to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, DomainError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(DomainError::DuplicateColumn(name.clone()));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DomainError::RaggedRow {
                    row: idx,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Builds a table from string literals. Mostly used by tests and fixtures.
    pub fn from_records<S: AsRef<str>>(
        columns: &[S],
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, DomainError> {
        let columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ToolError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ToolError::ColumnNotFound(name.to_string()))
    }

    /// Iterates the cells of one column in row order.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Value> + '_, ToolError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// One row as a `column -> value` object, preserving column order.
    pub fn record(&self, row: usize) -> Map<String, JsonValue> {
        let mut record = Map::new();
        if let Some(cells) = self.rows.get(row) {
            for (name, cell) in self.columns.iter().zip(cells) {
                record.insert(name.clone(), cell.to_json());
            }
        }
        record
    }
}

/// The three logical tables of a validation run. Stock is mandatory by
/// construction, the others are optional reference datasets.
#[derive(Debug, Clone)]
pub struct TableBundle {
    pub stock: Table,
    pub master: Option<Table>,
    pub gr: Option<Table>,
}

impl TableBundle {
    pub fn new(stock: Table) -> Self {
        Self {
            stock,
            master: None,
            gr: None,
        }
    }

    pub fn with_master(mut self, master: Table) -> Self {
        self.master = Some(master);
        self
    }

    pub fn with_gr(mut self, gr: Table) -> Self {
        self.gr = Some(gr);
        self
    }
}
