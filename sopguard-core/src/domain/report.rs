// sopguard-core/src/domain/report.rs

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::domain::checklist::Rule;
use crate::domain::table::Value;

/// Outcome of one checklist rule. `tool` is `None` when the rule could not
/// be routed to any operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRecord {
    pub check: String,
    pub tool: Option<String>,
    pub passed: bool,
    pub details: Map<String, JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Value>,
}

impl ValidationRecord {
    pub fn new(
        check: impl Into<String>,
        tool: Option<String>,
        passed: bool,
        details: Map<String, JsonValue>,
    ) -> Self {
        Self {
            check: check.into(),
            tool,
            passed,
            details,
            id: None,
            severity: None,
        }
    }

    /// Failed record carrying `{"error": message}` plus any extra details.
    pub fn failure(
        check: impl Into<String>,
        tool: Option<String>,
        message: impl Into<String>,
        extra: impl IntoIterator<Item = (String, JsonValue)>,
    ) -> Self {
        let mut details = Map::new();
        details.insert("error".to_string(), JsonValue::String(message.into()));
        details.extend(extra);
        Self::new(check, tool, false, details)
    }

    /// Copies the rule's `id` / `severity` metadata onto the record.
    pub fn with_rule_metadata(mut self, rule: &Rule) -> Self {
        self.id = rule.id.clone();
        self.severity = rule.severity.clone();
        self
    }

    pub fn error(&self) -> Option<&str> {
        self.details.get("error").and_then(JsonValue::as_str)
    }
}

/// Ordered results of a checklist run, one record per rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    records: Vec<ValidationRecord>,
    declares_id: bool,
    declares_severity: bool,
}

impl ValidationReport {
    pub fn new(declares_id: bool, declares_severity: bool) -> Self {
        Self {
            records: Vec::new(),
            declares_id,
            declares_severity,
        }
    }

    pub fn push(&mut self, record: ValidationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ValidationRecord] {
        &self.records
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn passed_count(&self) -> usize {
        self.records.iter().filter(|r| r.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.records.iter().all(|r| r.passed)
    }

    /// First `limit` failed records, in checklist order.
    pub fn failures(&self, limit: usize) -> impl Iterator<Item = &ValidationRecord> {
        self.records.iter().filter(|r| !r.passed).take(limit)
    }

    /// Whether exports should carry an `id` column.
    pub fn declares_id(&self) -> bool {
        self.declares_id
    }

    pub fn declares_severity(&self) -> bool {
        self.declares_severity
    }
}
