// sopguard-core/src/domain/catalog/intent.rs
//
// Resolver output crosses a trust boundary: it is JSON shaped by a model.
// Nothing here deserializes it straight into operation arguments; the raw
// object is first checked against the catalog schema, then read field by field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::warn;

use super::{ArgSpec, ArgType, ToolKind};

/// `{tool, args}` exactly as the resolver produced it. Untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIntent {
    pub tool: String,
    #[serde(default)]
    pub args: JsonValue,
}

impl RawIntent {
    pub fn new(tool: impl Into<String>, args: JsonValue) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntentError {
    #[error("unknown tool")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dataset {
    #[default]
    Stock,
    Gr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatesArgs {
    pub columns: Vec<String>,
    pub allowed: bool,
    pub dataset: Dataset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterLookupArgs {
    pub column: String,
    pub master_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeArgs {
    pub column: String,
    pub min_val: Option<f64>,
    pub max_val: Option<f64>,
    pub inclusive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegexArgs {
    pub column: String,
    pub pattern: String,
    pub mode: MatchMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyMatchArgs {
    pub keys: Vec<String>,
    pub column: String,
}

/// A resolved rule, one variant per catalog tool.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ColumnExists { column: String },
    DuplicatesCheck(DuplicatesArgs),
    ValueInMaster(MasterLookupArgs),
    RowCondition { expr: String },
    DateNotFuture { column: String },
    ValueRange(RangeArgs),
    RegexMatch(RegexArgs),
    MatchMasterOnKeys(KeyMatchArgs),
}

impl Operation {
    pub fn kind(&self) -> ToolKind {
        match self {
            Operation::ColumnExists { .. } => ToolKind::ColumnExists,
            Operation::DuplicatesCheck(_) => ToolKind::DuplicatesCheck,
            Operation::ValueInMaster(_) => ToolKind::ValueInMaster,
            Operation::RowCondition { .. } => ToolKind::RowCondition,
            Operation::DateNotFuture { .. } => ToolKind::DateNotFuture,
            Operation::ValueRange(_) => ToolKind::ValueRange,
            Operation::RegexMatch(_) => ToolKind::RegexMatch,
            Operation::MatchMasterOnKeys(_) => ToolKind::MatchMasterOnKeys,
        }
    }

    /// Validates a raw intent against the catalog and builds the typed operation.
    pub fn from_intent(intent: &RawIntent) -> Result<Self, IntentError> {
        let kind = ToolKind::from_name(intent.tool.trim())
            .ok_or_else(|| IntentError::UnknownTool(intent.tool.clone()))?;

        let empty = Map::new();
        let args = match &intent.args {
            JsonValue::Object(map) => map,
            JsonValue::Null => &empty,
            other => {
                return Err(IntentError::InvalidArguments(format!(
                    "expected an object, got {}",
                    json_type(other)
                )));
            }
        };

        validate_schema(kind, args)?;
        let args = Args(args);

        let op = match kind {
            ToolKind::ColumnExists => Operation::ColumnExists {
                column: args.string("column")?,
            },
            ToolKind::DuplicatesCheck => Operation::DuplicatesCheck(DuplicatesArgs {
                columns: args.strings("columns")?,
                allowed: args.opt_bool("allowed")?.unwrap_or(false),
                dataset: match args.opt_str("dataset")? {
                    Some("gr") => Dataset::Gr,
                    _ => Dataset::Stock,
                },
            }),
            ToolKind::ValueInMaster => Operation::ValueInMaster(MasterLookupArgs {
                column: args.string("column")?,
                master_column: args.string("master_column")?,
            }),
            ToolKind::RowCondition => Operation::RowCondition {
                expr: args.string("expr")?,
            },
            ToolKind::DateNotFuture => Operation::DateNotFuture {
                column: args.string("column")?,
            },
            ToolKind::ValueRange => Operation::ValueRange(RangeArgs {
                column: args.string("column")?,
                min_val: args.opt_number("min_val")?,
                max_val: args.opt_number("max_val")?,
                inclusive: args.opt_bool("inclusive")?.unwrap_or(true),
            }),
            ToolKind::RegexMatch => Operation::RegexMatch(RegexArgs {
                column: args.string("column")?,
                pattern: args.string("pattern")?,
                mode: match args.opt_str("mode")? {
                    Some("any") => MatchMode::Any,
                    _ => MatchMode::All,
                },
            }),
            ToolKind::MatchMasterOnKeys => Operation::MatchMasterOnKeys(KeyMatchArgs {
                keys: args.strings("keys")?,
                column: args.string("column")?,
            }),
        };

        Ok(op)
    }
}

fn validate_schema(kind: ToolKind, args: &Map<String, JsonValue>) -> Result<(), IntentError> {
    let specs = kind.args();

    for key in args.keys() {
        if !specs.iter().any(|s| s.name == key) {
            warn!(tool = kind.name(), argument = %key, "Ignoring undeclared argument");
        }
    }

    for spec in specs {
        match args.get(spec.name) {
            None | Some(JsonValue::Null) => {
                if spec.required {
                    return Err(IntentError::InvalidArguments(format!(
                        "missing required argument '{}'",
                        spec.name
                    )));
                }
            }
            Some(value) => check_type(spec, value)?,
        }
    }
    Ok(())
}

fn check_type(spec: &ArgSpec, value: &JsonValue) -> Result<(), IntentError> {
    let mismatch = |expected: &str| {
        IntentError::InvalidArguments(format!(
            "argument '{}' must be {}, got {}",
            spec.name,
            expected,
            json_type(value)
        ))
    };

    match spec.ty {
        ArgType::String => {
            if !value.is_string() {
                return Err(mismatch("a string"));
            }
        }
        ArgType::Number => {
            if !value.as_f64().is_some_and(f64::is_finite) {
                return Err(mismatch("a number"));
            }
        }
        ArgType::Boolean => {
            if !value.is_boolean() {
                return Err(mismatch("a boolean"));
            }
        }
        ArgType::StringArray => {
            let items = value.as_array().ok_or_else(|| mismatch("an array of strings"))?;
            if items.is_empty() {
                return Err(IntentError::InvalidArguments(format!(
                    "argument '{}' must list at least one column",
                    spec.name
                )));
            }
            if !items.iter().all(JsonValue::is_string) {
                return Err(mismatch("an array of strings"));
            }
        }
        ArgType::OneOf(allowed) => {
            let s = value.as_str().ok_or_else(|| mismatch("a string"))?;
            if !allowed.contains(&s) {
                return Err(IntentError::InvalidArguments(format!(
                    "argument '{}' must be one of {:?}, got '{}'",
                    spec.name, allowed, s
                )));
            }
        }
    }
    Ok(())
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Typed accessors over an argument object that already passed `validate_schema`.
struct Args<'a>(&'a Map<String, JsonValue>);

impl<'a> Args<'a> {
    fn missing(name: &str) -> IntentError {
        IntentError::InvalidArguments(format!("missing required argument '{}'", name))
    }

    fn opt_str(&self, name: &str) -> Result<Option<&'a str>, IntentError> {
        match self.0.get(name) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(IntentError::InvalidArguments(format!(
                "argument '{}' must be a string",
                name
            ))),
        }
    }

    fn string(&self, name: &str) -> Result<String, IntentError> {
        self.opt_str(name)?
            .map(str::to_string)
            .ok_or_else(|| Self::missing(name))
    }

    fn strings(&self, name: &str) -> Result<Vec<String>, IntentError> {
        let items = self
            .0
            .get(name)
            .and_then(JsonValue::as_array)
            .ok_or_else(|| Self::missing(name))?;
        items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    IntentError::InvalidArguments(format!(
                        "argument '{}' must be an array of strings",
                        name
                    ))
                })
            })
            .collect()
    }

    fn opt_bool(&self, name: &str) -> Result<Option<bool>, IntentError> {
        match self.0.get(name) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(IntentError::InvalidArguments(format!(
                "argument '{}' must be a boolean",
                name
            ))),
        }
    }

    fn opt_number(&self, name: &str) -> Result<Option<f64>, IntentError> {
        match self.0.get(name) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                IntentError::InvalidArguments(format!("argument '{}' must be a number", name))
            }),
        }
    }
}
