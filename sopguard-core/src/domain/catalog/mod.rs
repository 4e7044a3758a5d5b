// sopguard-core/src/domain/catalog/mod.rs
//
// The fixed set of validation operations a SOP rule can resolve to.
// The argument table below is the single source for both the description
// advertised to the resolver and the validation applied to its answer.

pub mod expression;
pub mod intent;
pub mod tools;

pub use intent::{Dataset, IntentError, MatchMode, Operation, RawIntent};
pub use tools::ToolResult;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};

/// Maximum number of offending rows reported per check.
pub const EXAMPLES_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ColumnExists,
    DuplicatesCheck,
    ValueInMaster,
    RowCondition,
    DateNotFuture,
    ValueRange,
    RegexMatch,
    MatchMasterOnKeys,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgType {
    String,
    /// Non-empty array of strings.
    StringArray,
    Number,
    Boolean,
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
}

const fn required(name: &'static str, ty: ArgType) -> ArgSpec {
    ArgSpec {
        name,
        ty,
        required: true,
    }
}

const fn optional(name: &'static str, ty: ArgType) -> ArgSpec {
    ArgSpec {
        name,
        ty,
        required: false,
    }
}

pub const DATASETS: &[&str] = &["stock", "gr"];
pub const MATCH_MODES: &[&str] = &["all", "any"];

const COLUMN_ARGS: &[ArgSpec] = &[required("column", ArgType::String)];

const DUPLICATES_ARGS: &[ArgSpec] = &[
    required("columns", ArgType::StringArray),
    optional("allowed", ArgType::Boolean),
    optional("dataset", ArgType::OneOf(DATASETS)),
];

const VALUE_IN_MASTER_ARGS: &[ArgSpec] = &[
    required("column", ArgType::String),
    required("master_column", ArgType::String),
];

const ROW_CONDITION_ARGS: &[ArgSpec] = &[required("expr", ArgType::String)];

const VALUE_RANGE_ARGS: &[ArgSpec] = &[
    required("column", ArgType::String),
    optional("min_val", ArgType::Number),
    optional("max_val", ArgType::Number),
    optional("inclusive", ArgType::Boolean),
];

const REGEX_ARGS: &[ArgSpec] = &[
    required("column", ArgType::String),
    required("pattern", ArgType::String),
    optional("mode", ArgType::OneOf(MATCH_MODES)),
];

const MATCH_KEYS_ARGS: &[ArgSpec] = &[
    required("keys", ArgType::StringArray),
    required("column", ArgType::String),
];

impl ToolKind {
    pub const ALL: [ToolKind; 8] = [
        ToolKind::ColumnExists,
        ToolKind::DuplicatesCheck,
        ToolKind::ValueInMaster,
        ToolKind::RowCondition,
        ToolKind::DateNotFuture,
        ToolKind::ValueRange,
        ToolKind::RegexMatch,
        ToolKind::MatchMasterOnKeys,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ColumnExists => "column_exists",
            ToolKind::DuplicatesCheck => "duplicates_check",
            ToolKind::ValueInMaster => "value_in_master",
            ToolKind::RowCondition => "row_condition",
            ToolKind::DateNotFuture => "date_not_future",
            ToolKind::ValueRange => "value_range",
            ToolKind::RegexMatch => "regex_match",
            ToolKind::MatchMasterOnKeys => "match_master_on_keys",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::ColumnExists => "Verify that a column exists in the target dataset.",
            ToolKind::DuplicatesCheck => {
                "Check duplicate rows based on key columns. Optional dataset 'gr' for GR formats."
            }
            ToolKind::ValueInMaster => {
                "Validate that values of a stock column exist in master column."
            }
            ToolKind::RowCondition => {
                "Evaluate a boolean expression across rows (e.g., `Current Stock` > 0). \
                 Quote column names containing spaces with backticks."
            }
            ToolKind::DateNotFuture => "Ensure all dates in column are not in the future.",
            ToolKind::ValueRange => {
                "Numeric range validation. Use thousands separators compatible values."
            }
            ToolKind::RegexMatch => {
                "Regex validation if the SOP explicitly defines a pattern to match."
            }
            ToolKind::MatchMasterOnKeys => {
                "Join stock to master on keys and compare a column (dates supported)."
            }
        }
    }

    pub fn args(self) -> &'static [ArgSpec] {
        match self {
            ToolKind::ColumnExists => COLUMN_ARGS,
            ToolKind::DuplicatesCheck => DUPLICATES_ARGS,
            ToolKind::ValueInMaster => VALUE_IN_MASTER_ARGS,
            ToolKind::RowCondition => ROW_CONDITION_ARGS,
            ToolKind::DateNotFuture => COLUMN_ARGS,
            ToolKind::ValueRange => VALUE_RANGE_ARGS,
            ToolKind::RegexMatch => REGEX_ARGS,
            ToolKind::MatchMasterOnKeys => MATCH_KEYS_ARGS,
        }
    }

    /// Operations that cannot run without the master dataset.
    pub fn requires_master(self) -> bool {
        matches!(self, ToolKind::ValueInMaster | ToolKind::MatchMasterOnKeys)
    }

    /// JSON-schema-like description of the argument object.
    pub fn args_schema(self) -> JsonValue {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in self.args() {
            properties.insert(spec.name.to_string(), spec.ty.schema());
            if spec.required {
                required.push(JsonValue::from(spec.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            args: self.args_schema(),
            description: self.description().to_string(),
        }
    }
}

impl ArgType {
    fn schema(self) -> JsonValue {
        match self {
            ArgType::String => json!({"type": "string"}),
            ArgType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
            ArgType::Number => json!({"type": "number"}),
            ArgType::Boolean => json!({"type": "boolean"}),
            ArgType::OneOf(values) => json!({"type": "string", "enum": values}),
        }
    }
}

/// What the resolver sees for one operation. This is the serialized contract
/// at the system boundary: keep it stable when swapping resolvers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub args: JsonValue,
    pub description: String,
}

pub fn describe_catalog() -> Vec<ToolDescriptor> {
    ToolKind::ALL.into_iter().map(ToolKind::descriptor).collect()
}
