// sopguard-core/src/domain/checklist.rs

use crate::domain::error::DomainError;
use crate::domain::table::{Table, Value};

pub const CHECKS_COLUMN: &str = "checks";
pub const ID_COLUMN: &str = "id";
pub const SEVERITY_COLUMN: &str = "severity";

/// One SOP line. `id` / `severity` are `None` when the checklist does not
/// declare the column at all, `Some(Value::Null)` when the cell is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub text: String,
    pub id: Option<Value>,
    pub severity: Option<Value>,
}

impl Rule {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: None,
            severity: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Checklist {
    rules: Vec<Rule>,
    declares_id: bool,
    declares_severity: bool,
}

impl Checklist {
    pub fn new(rules: Vec<Rule>) -> Self {
        let declares_id = rules.iter().any(|r| r.id.is_some());
        let declares_severity = rules.iter().any(|r| r.severity.is_some());
        Self {
            rules,
            declares_id,
            declares_severity,
        }
    }

    /// Reads the `checks` column (required) and the optional `id` and
    /// `severity` metadata columns.
    pub fn from_table(table: &Table) -> Result<Self, DomainError> {
        let checks_idx = table
            .columns()
            .iter()
            .position(|c| c == CHECKS_COLUMN)
            .ok_or_else(|| DomainError::MissingChecksColumn(CHECKS_COLUMN.to_string()))?;
        let id_idx = table.columns().iter().position(|c| c == ID_COLUMN);
        let severity_idx = table.columns().iter().position(|c| c == SEVERITY_COLUMN);

        let rules = table
            .rows()
            .iter()
            .map(|row| Rule {
                text: row[checks_idx].to_string(),
                id: id_idx.map(|i| row[i].clone()),
                severity: severity_idx.map(|i| row[i].clone()),
            })
            .collect();

        Ok(Self {
            rules,
            declares_id: id_idx.is_some(),
            declares_severity: severity_idx.is_some(),
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn declares_id(&self) -> bool {
        self.declares_id
    }

    pub fn declares_severity(&self) -> bool {
        self.declares_severity
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_table_with_metadata() {
        let table = Table::from_records(
            &["id", "severity", "checks"],
            vec![
                vec![
                    Value::from("1"),
                    Value::from("H"),
                    Value::from("Column 'Plant' must exist"),
                ],
                vec![Value::from("2"), Value::Null, Value::from("No duplicates")],
            ],
        )
        .unwrap();

        let checklist = Checklist::from_table(&table).unwrap();
        assert_eq!(checklist.len(), 2);
        assert_eq!(checklist.rules()[0].text, "Column 'Plant' must exist");
        assert_eq!(checklist.rules()[0].severity, Some(Value::from("H")));
        assert_eq!(checklist.rules()[1].severity, Some(Value::Null));
        assert!(checklist.declares_id());
        assert!(checklist.declares_severity());
    }

    #[test]
    fn test_from_table_without_metadata() {
        let table =
            Table::from_records(&["checks"], vec![vec![Value::from("Batch must exist")]]).unwrap();

        let checklist = Checklist::from_table(&table).unwrap();
        assert_eq!(checklist.rules()[0].id, None);
        assert_eq!(checklist.rules()[0].severity, None);
        assert!(!checklist.declares_id());
    }

    #[test]
    fn test_missing_checks_column() {
        let table = Table::from_records(&["rule"], vec![]).unwrap();
        assert!(matches!(
            Checklist::from_table(&table),
            Err(DomainError::MissingChecksColumn(_))
        ));
    }
}
