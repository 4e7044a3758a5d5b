// sopguard-core/src/application/dispatcher.rs

use chrono::{Local, NaiveDate};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::domain::catalog::{Dataset, IntentError, Operation, RawIntent, ToolResult, tools};
use crate::domain::error::ToolError;
use crate::domain::report::ValidationRecord;
use crate::domain::table::{Table, TableBundle};
use crate::ports::resolver::{Resolution, ResolverError};

pub const UNABLE_TO_ROUTE: &str = "unable to route";
pub const UNKNOWN_TOOL: &str = "unknown tool";
pub const MASTER_REQUIRED: &str = "master data required";

/// Turns a resolver answer into a `ValidationRecord`.
///
/// Never fails: every problem (unrouted rule, unknown tool, bad arguments,
/// missing column...) ends up as a failed record with an `error` detail.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    today: NaiveDate,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }
}

enum DispatchFailure {
    MasterRequired,
    Tool(ToolError),
}

impl From<ToolError> for DispatchFailure {
    fn from(err: ToolError) -> Self {
        DispatchFailure::Tool(err)
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes "today" for `date_not_future`.
    pub fn with_reference_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.today
    }

    pub fn execute(
        &self,
        check: &str,
        resolution: Result<Resolution, ResolverError>,
        tables: &TableBundle,
    ) -> ValidationRecord {
        match resolution {
            Ok(Resolution::Resolved(intent)) => self.execute_intent(check, &intent, tables),
            Ok(Resolution::Unresolved) => {
                ValidationRecord::failure(check, None, UNABLE_TO_ROUTE, [])
            }
            Err(err) => {
                warn!("⚠️ Resolver error for '{}': {}", check, err);
                ValidationRecord::failure(
                    check,
                    None,
                    UNABLE_TO_ROUTE,
                    [("reason".to_string(), JsonValue::String(err.to_string()))],
                )
            }
        }
    }

    pub fn execute_intent(
        &self,
        check: &str,
        intent: &RawIntent,
        tables: &TableBundle,
    ) -> ValidationRecord {
        let tool = intent.tool.trim().to_string();
        let args_detail = || [("args".to_string(), intent.args.clone())];

        let operation = match Operation::from_intent(intent) {
            Ok(op) => op,
            Err(IntentError::UnknownTool(name)) => {
                debug!("Unknown tool proposed for '{}': {}", check, name);
                return ValidationRecord::failure(check, Some(tool), UNKNOWN_TOOL, []);
            }
            Err(err @ IntentError::InvalidArguments(_)) => {
                return ValidationRecord::failure(check, Some(tool), err.to_string(), args_detail());
            }
        };
        debug!(?operation, "Resolved '{}'", check);

        match self.run(&operation, tables) {
            Ok(result) => ValidationRecord::new(check, Some(tool), result.passed, result.details),
            Err(DispatchFailure::MasterRequired) => {
                ValidationRecord::failure(check, Some(tool), MASTER_REQUIRED, [])
            }
            Err(DispatchFailure::Tool(err)) => {
                ValidationRecord::failure(check, Some(tool), err.to_string(), args_detail())
            }
        }
    }

    fn run(&self, operation: &Operation, tables: &TableBundle) -> Result<ToolResult, DispatchFailure> {
        let stock = &tables.stock;
        let master = match (operation.kind().requires_master(), tables.master.as_ref()) {
            (true, None) => return Err(DispatchFailure::MasterRequired),
            (_, master) => master,
        };
        let master = || master.ok_or(DispatchFailure::MasterRequired);

        let result = match operation {
            Operation::ColumnExists { column } => tools::column_exists(stock, column),
            Operation::DuplicatesCheck(args) => {
                let target = select_dataset(args.dataset, tables);
                tools::duplicates_check(target, args)?
            }
            Operation::ValueInMaster(args) => tools::value_in_master(stock, master()?, args)?,
            Operation::RowCondition { expr } => tools::row_condition(stock, expr)?,
            Operation::DateNotFuture { column } => {
                tools::date_not_future(stock, column, self.today)?
            }
            Operation::ValueRange(args) => tools::value_range(stock, args)?,
            Operation::RegexMatch(args) => tools::regex_match(stock, args)?,
            Operation::MatchMasterOnKeys(args) => {
                tools::match_master_on_keys(stock, master()?, args)?
            }
        };
        Ok(result)
    }
}

fn select_dataset(dataset: Dataset, tables: &TableBundle) -> &Table {
    match (dataset, &tables.gr) {
        (Dataset::Gr, Some(gr)) => gr,
        (Dataset::Gr, None) => {
            warn!("⚠️ GR dataset requested but not loaded, checking stock instead");
            &tables.stock
        }
        (Dataset::Stock, _) => &tables.stock,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::catalog::ToolKind;
    use crate::domain::table::Value;
    use serde_json::json;

    fn stock() -> Table {
        Table::from_records(
            &["Material Code", "Batch", "Current Stock", "Date of Manufacturing"],
            vec![
                vec![
                    Value::from("MAT-001"),
                    Value::from("B1"),
                    Value::from("1,200"),
                    Value::from("2025-10-15"),
                ],
                vec![
                    Value::from("MAT-002"),
                    Value::from("B2"),
                    Value::from("-5"),
                    Value::from("2025-12-01"),
                ],
            ],
        )
        .unwrap()
    }

    fn gr() -> Table {
        Table::from_records(
            &["Material Code", "Batch"],
            vec![
                vec![Value::from("MAT-001"), Value::from("B1")],
                vec![Value::from("MAT-001"), Value::from("B1")],
            ],
        )
        .unwrap()
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new().with_reference_date(NaiveDate::from_ymd_opt(2025, 11, 4).unwrap())
    }

    fn resolved(tool: &str, args: JsonValue) -> Result<Resolution, ResolverError> {
        Ok(Resolution::Resolved(RawIntent::new(tool, args)))
    }

    #[test]
    fn test_unresolved_rule() {
        let tables = TableBundle::new(stock());
        let rec = dispatcher().execute("Something vague", Ok(Resolution::Unresolved), &tables);
        assert!(!rec.passed);
        assert_eq!(rec.tool, None);
        assert_eq!(rec.error(), Some(UNABLE_TO_ROUTE));
        assert!(rec.details.get("reason").is_none());
    }

    #[test]
    fn test_resolver_error_keeps_reason() {
        let tables = TableBundle::new(stock());
        let err = ResolverError::Transport("connection refused".into());
        let rec = dispatcher().execute("Rule", Err(err), &tables);
        assert_eq!(rec.error(), Some(UNABLE_TO_ROUTE));
        assert!(rec.details["reason"].as_str().unwrap().contains("connection refused"));
    }

    #[test]
    fn test_unknown_tool() {
        let tables = TableBundle::new(stock());
        let rec = dispatcher().execute("Rule", resolved("drop_table", json!({})), &tables);
        assert_eq!(rec.tool.as_deref(), Some("drop_table"));
        assert_eq!(rec.error(), Some(UNKNOWN_TOOL));
    }

    #[test]
    fn test_invalid_arguments_are_reported_with_args() {
        let tables = TableBundle::new(stock());
        let args = json!({"column": "Current Stock", "min_val": "zero"});
        let rec = dispatcher().execute("Rule", resolved("value_range", args.clone()), &tables);
        assert!(!rec.passed);
        assert!(rec.error().unwrap().starts_with("invalid arguments"));
        assert_eq!(rec.details["args"], args);
    }

    #[test]
    fn test_master_required() {
        let tables = TableBundle::new(stock());
        let args = json!({"column": "Material Code", "master_column": "Material Code"});
        let rec = dispatcher().execute("Rule", resolved("value_in_master", args), &tables);
        assert_eq!(rec.tool.as_deref(), Some("value_in_master"));
        assert_eq!(rec.error(), Some(MASTER_REQUIRED));
    }

    #[test]
    fn test_master_is_checked_before_columns() {
        let tables = TableBundle::new(stock());
        for kind in ToolKind::ALL.into_iter().filter(|k| k.requires_master()) {
            let args = match kind {
                ToolKind::ValueInMaster => json!({"column": "Plant", "master_column": "Plant"}),
                _ => json!({"keys": ["Plant"], "column": "Plant"}),
            };
            let rec = dispatcher().execute("Rule", resolved(kind.name(), args), &tables);
            assert_eq!(rec.error(), Some(MASTER_REQUIRED), "{}", kind.name());
        }
        // Master-free operations never ask for it
        let rec = dispatcher().execute("Rule", resolved("column_exists", json!({"column": "Batch"})), &tables);
        assert!(rec.passed);
    }

    #[test]
    fn test_tool_error_is_caught() {
        let tables = TableBundle::new(stock());
        let args = json!({"column": "Plant"});
        let rec = dispatcher().execute("Rule", resolved("date_not_future", args.clone()), &tables);
        assert!(!rec.passed);
        assert_eq!(rec.error(), Some("Column 'Plant' not found"));
        assert_eq!(rec.details["args"], args);
    }

    #[test]
    fn test_successful_dispatch_copies_result() {
        let tables = TableBundle::new(stock());
        let rec = dispatcher().execute(
            "Current stock must be positive",
            resolved("row_condition", json!({"expr": "`Current Stock` > 0"})),
            &tables,
        );
        assert_eq!(rec.tool.as_deref(), Some("row_condition"));
        assert!(!rec.passed);
        assert_eq!(rec.details["failing_count"], 1);
        assert_eq!(rec.details["examples"][0]["Material Code"], "MAT-002");
        assert!(rec.error().is_none());
    }

    #[test]
    fn test_reference_date_drives_future_check() {
        let tables = TableBundle::new(stock());
        let intent = || resolved("date_not_future", json!({"column": "Date of Manufacturing"}));

        let rec = dispatcher().execute("Rule", intent(), &tables);
        assert_eq!(rec.details["future_count"], 1);

        let later = Dispatcher::new().with_reference_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert!(later.execute("Rule", intent(), &tables).passed);
    }

    #[test]
    fn test_gr_dataset_selection() {
        let args = json!({"columns": ["Material Code", "Batch"], "dataset": "gr"});

        let with_gr = TableBundle::new(stock()).with_gr(gr());
        let rec = dispatcher().execute("Rule", resolved("duplicates_check", args.clone()), &with_gr);
        assert_eq!(rec.details["duplicate_count"], 2);

        // Falls back to stock, which has no duplicates
        let without_gr = TableBundle::new(stock());
        let rec = dispatcher().execute("Rule", resolved("duplicates_check", args), &without_gr);
        assert!(rec.passed);
    }

    #[test]
    fn test_tool_name_is_trimmed() {
        let tables = TableBundle::new(stock());
        let rec = dispatcher().execute(
            "Rule",
            resolved(" column_exists ", json!({"column": "Batch"})),
            &tables,
        );
        assert!(rec.passed);
        assert_eq!(rec.tool.as_deref(), Some("column_exists"));
    }
}
