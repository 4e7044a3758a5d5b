// sopguard-core/src/domain/catalog/tools.rs
//
// The validation operations. Each one is a pure function over borrowed
// tables: a failing check is a normal `passed = false` result, an `Err` only
// means the input could not be evaluated at all (missing column, bad regex...).

use std::collections::HashMap;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};

use super::EXAMPLES_LIMIT;
use super::expression::RowCondition;
use super::intent::{DuplicatesArgs, KeyMatchArgs, MasterLookupArgs, MatchMode, RangeArgs, RegexArgs};
use crate::domain::coercion::{coerce_numeric, display_text, parse_date_safe, start_of_day};
use crate::domain::error::ToolError;
use crate::domain::table::{CellKey, Table};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub passed: bool,
    pub details: Map<String, JsonValue>,
}

impl ToolResult {
    /// Result for row-level checks: `count_field` holds the number of
    /// offending rows, `examples` the first few of them in table order.
    fn from_offending_rows(table: &Table, count_field: &str, offending: &[usize]) -> Self {
        let mut details = Map::new();
        details.insert(count_field.to_string(), json!(offending.len()));
        details.insert("examples".to_string(), sample_rows(table, offending));
        Self {
            passed: offending.is_empty(),
            details,
        }
    }
}

fn sample_rows(table: &Table, rows: &[usize]) -> JsonValue {
    JsonValue::Array(
        rows.iter()
            .take(EXAMPLES_LIMIT)
            .map(|&idx| JsonValue::Object(table.record(idx)))
            .collect(),
    )
}

fn row_key(table: &Table, row: usize, indices: &[usize]) -> Vec<CellKey> {
    indices
        .iter()
        .map(|&col| table.cell(row, col).map(|v| v.key()).unwrap_or(CellKey::Null))
        .collect()
}

fn column_indices(table: &Table, columns: &[String]) -> Result<Vec<usize>, ToolError> {
    columns.iter().map(|c| table.column_index(c)).collect()
}

// --- STRUCTURE ---

pub fn column_exists(table: &Table, column: &str) -> ToolResult {
    let ok = table.has_column(column);
    let missing: Vec<&str> = if ok { vec![] } else { vec![column] };
    let mut details = Map::new();
    details.insert("missing".to_string(), json!(missing));
    ToolResult {
        passed: ok,
        details,
    }
}

// --- UNICITY ---

/// Flags every row of a duplicated group (not only the extra copies), so the
/// count does not depend on row order.
pub fn duplicates_check(table: &Table, args: &DuplicatesArgs) -> Result<ToolResult, ToolError> {
    let indices = column_indices(table, &args.columns)?;

    let keys: Vec<Vec<CellKey>> = (0..table.len())
        .map(|row| row_key(table, row, &indices))
        .collect();

    let mut group_sizes: HashMap<&[CellKey], usize> = HashMap::new();
    for key in &keys {
        *group_sizes.entry(key.as_slice()).or_default() += 1;
    }

    let duplicated: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter(|(_, key)| group_sizes.get(key.as_slice()).copied().unwrap_or(0) > 1)
        .map(|(row, _)| row)
        .collect();

    let mut result = ToolResult::from_offending_rows(table, "duplicate_count", &duplicated);
    result.passed = args.allowed || duplicated.is_empty();
    Ok(result)
}

// --- REFERENCE DATA ---

pub fn value_in_master(
    stock: &Table,
    master: &Table,
    args: &MasterLookupArgs,
) -> Result<ToolResult, ToolError> {
    let allowed: std::collections::HashSet<CellKey> =
        master.column(&args.master_column)?.map(|v| v.key()).collect();

    let missing: Vec<usize> = stock
        .column(&args.column)?
        .enumerate()
        .filter(|(_, value)| !allowed.contains(&value.key()))
        .map(|(row, _)| row)
        .collect();

    Ok(ToolResult::from_offending_rows(stock, "missing_count", &missing))
}

/// Left join of stock onto master on `keys`, then date-aware comparison of
/// `column`. A stock key without master counterpart is a mismatch.
pub fn match_master_on_keys(
    stock: &Table,
    master: &Table,
    args: &KeyMatchArgs,
) -> Result<ToolResult, ToolError> {
    let stock_keys = column_indices(stock, &args.keys)?;
    let master_keys = column_indices(master, &args.keys)?;
    let stock_col = stock.column_index(&args.column)?;
    let master_col = master.column_index(&args.column)?;

    let mut master_index: HashMap<Vec<CellKey>, Vec<usize>> = HashMap::new();
    for row in 0..master.len() {
        master_index
            .entry(row_key(master, row, &master_keys))
            .or_default()
            .push(row);
    }

    let stock_name = format!("{}_stock", args.column);
    let master_name = format!("{}_master", args.column);
    let mut mismatch_count = 0usize;
    let mut examples = Vec::new();

    for row in 0..stock.len() {
        let matches = master_index
            .get(&row_key(stock, row, &stock_keys))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        // Unmatched keys still produce one joined row with an empty master side
        let master_rows: Vec<Option<usize>> = if matches.is_empty() {
            vec![None]
        } else {
            matches.iter().copied().map(Some).collect()
        };

        let stock_value = stock.cell(row, stock_col);
        let stock_date = stock_value.and_then(parse_date_safe);

        for master_row in master_rows {
            let master_value = master_row.and_then(|m| master.cell(m, master_col));
            let master_date = master_value.and_then(parse_date_safe);

            let mismatch = master_date.is_none() || stock_date != master_date;
            if !mismatch {
                continue;
            }

            mismatch_count += 1;
            if examples.len() < EXAMPLES_LIMIT {
                let mut record = Map::new();
                for (key, &col) in args.keys.iter().zip(&stock_keys) {
                    let value = stock.cell(row, col).map(|v| v.to_json());
                    record.insert(key.clone(), value.unwrap_or(JsonValue::Null));
                }
                record.insert(
                    stock_name.clone(),
                    stock_value.map(|v| v.to_json()).unwrap_or(JsonValue::Null),
                );
                record.insert(
                    master_name.clone(),
                    master_value.map(|v| v.to_json()).unwrap_or(JsonValue::Null),
                );
                examples.push(JsonValue::Object(record));
            }
        }
    }

    let mut details = Map::new();
    details.insert("mismatch_count".to_string(), json!(mismatch_count));
    details.insert("examples".to_string(), JsonValue::Array(examples));
    Ok(ToolResult {
        passed: mismatch_count == 0,
        details,
    })
}

// --- ROW RULES ---

pub fn row_condition(table: &Table, expr: &str) -> Result<ToolResult, ToolError> {
    let condition = RowCondition::parse(expr)?;
    let failing: Vec<usize> = condition
        .evaluate(table)?
        .into_iter()
        .enumerate()
        .filter(|(_, verdict)| *verdict != Some(true))
        .map(|(row, _)| row)
        .collect();

    Ok(ToolResult::from_offending_rows(table, "failing_count", &failing))
}

/// A row fails only when its date parses and is strictly after `today`
/// (midnight). Missing or unparseable dates never fail.
pub fn date_not_future(
    table: &Table,
    column: &str,
    today: NaiveDate,
) -> Result<ToolResult, ToolError> {
    let now = start_of_day(today);
    let future: Vec<usize> = table
        .column(column)?
        .enumerate()
        .filter(|(_, value)| parse_date_safe(value).is_some_and(|d| d > now))
        .map(|(row, _)| row)
        .collect();

    Ok(ToolResult::from_offending_rows(table, "future_count", &future))
}

/// Unlike `date_not_future`, a value that does not coerce to a number fails
/// any bound it is checked against.
pub fn value_range(table: &Table, args: &RangeArgs) -> Result<ToolResult, ToolError> {
    let values = coerce_numeric(table, &args.column)?;

    let within = |value: Option<f64>| -> bool {
        let above_min = args.min_val.is_none_or(|min| {
            value.is_some_and(|v| if args.inclusive { v >= min } else { v > min })
        });
        let below_max = args.max_val.is_none_or(|max| {
            value.is_some_and(|v| if args.inclusive { v <= max } else { v < max })
        });
        above_min && below_max
    };

    let failing: Vec<usize> = values
        .into_iter()
        .enumerate()
        .filter(|(_, value)| !within(*value))
        .map(|(row, _)| row)
        .collect();

    Ok(ToolResult::from_offending_rows(table, "failing_count", &failing))
}

/// Patterns are anchored at the start of the value only, like Python's `re.match`.
pub fn regex_match(table: &Table, args: &RegexArgs) -> Result<ToolResult, ToolError> {
    let regex = Regex::new(&format!("^(?:{})", args.pattern)).map_err(|e| {
        ToolError::InvalidPattern {
            pattern: args.pattern.clone(),
            reason: e.to_string(),
        }
    })?;

    let matches: Vec<bool> = table
        .column(&args.column)?
        .map(|value| regex.is_match(&display_text(value)))
        .collect();

    match args.mode {
        MatchMode::All => {
            let failing: Vec<usize> = matches
                .iter()
                .enumerate()
                .filter(|(_, matched)| !**matched)
                .map(|(row, _)| row)
                .collect();
            Ok(ToolResult::from_offending_rows(table, "failing_count", &failing))
        }
        MatchMode::Any => {
            let matching: Vec<usize> = matches
                .iter()
                .enumerate()
                .filter(|(_, matched)| **matched)
                .map(|(row, _)| row)
                .collect();
            let mut details = Map::new();
            details.insert("match_count".to_string(), json!(matching.len()));
            details.insert("examples".to_string(), sample_rows(table, &matching));
            Ok(ToolResult {
                passed: !matching.is_empty(),
                details,
            })
        }
    }
}
