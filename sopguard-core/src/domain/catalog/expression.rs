// sopguard-core/src/domain/catalog/expression.rs
//
// Boolean row conditions ("`Current Stock` > 0 AND UoM = 'KG'", or the pandas
// spelling "`Current Stock` > 0 & UoM == 'KG'").
// Parsing is delegated to sqlparser, evaluation is done here, row by row,
// with SQL three-valued logic: a row only passes when the condition is TRUE.

use std::cmp::Ordering;

use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator, Value as SqlValue};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::domain::coercion::parse_number;
use crate::domain::error::ToolError;
use crate::domain::table::{Table, Value};

#[derive(Debug, Clone)]
pub struct RowCondition {
    source: String,
    ast: Expr,
    columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RowCondition {
    pub fn parse(source: &str) -> Result<Self, ToolError> {
        let dialect = GenericDialect {};
        let invalid = |reason: String| ToolError::InvalidExpression {
            expr: source.to_string(),
            reason,
        };

        let tokens = Tokenizer::new(&dialect, source)
            .tokenize()
            .map_err(|e| invalid(e.to_string()))?;
        let mut parser = Parser::new(&dialect).with_tokens(logical_tokens(tokens));
        let ast = parser.parse_expr().map_err(|e| invalid(e.to_string()))?;

        let next = parser.peek_token();
        if next.token != Token::EOF {
            return Err(invalid(format!("unexpected trailing input at '{}'", next.token)));
        }

        let mut columns = Vec::new();
        collect_columns(&ast, &mut columns).map_err(invalid)?;

        Ok(Self {
            source: source.to_string(),
            ast,
            columns,
        })
    }

    /// Column names referenced by the condition, in order of first appearance.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Evaluates the condition on every row. `Some(true)` passes, `Some(false)`
    /// and `None` (unknown, e.g. a null operand) fail.
    pub fn evaluate(&self, table: &Table) -> Result<Vec<Option<bool>>, ToolError> {
        let indices = self
            .columns
            .iter()
            .map(|name| table.column_index(name).map(|idx| (name.as_str(), idx)))
            .collect::<Result<Vec<_>, _>>()?;

        let ctx = EvalContext {
            source: &self.source,
            indices: &indices,
        };

        table
            .rows()
            .iter()
            .map(|row| match ctx.eval(&self.ast, row)? {
                Scalar::Bool(b) => Ok(Some(b)),
                Scalar::Null => Ok(None),
                other => Err(ctx.invalid(format!(
                    "condition does not evaluate to a boolean (got {:?})",
                    other
                ))),
            })
            .collect()
    }
}

/// `&`, `|` and `~` are the logical AND, OR and NOT of pandas-style
/// conditions, so they bind looser than comparisons.
fn logical_tokens(tokens: Vec<Token>) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|token| match token {
            Token::Ampersand => Token::make_keyword("AND"),
            Token::Pipe => Token::make_keyword("OR"),
            Token::Tilde => Token::make_keyword("NOT"),
            other => other,
        })
        .collect()
}

fn identifier_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => Some(
            parts
                .iter()
                .map(|p| p.value.as_str())
                .collect::<Vec<_>>()
                .join("."),
        ),
        _ => None,
    }
}

/// Walks the tree once at parse time so unsupported syntax is rejected even
/// when the table is empty.
fn collect_columns(expr: &Expr, out: &mut Vec<String>) -> Result<(), String> {
    if let Some(name) = identifier_name(expr) {
        if !out.contains(&name) {
            out.push(name);
        }
        return Ok(());
    }

    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::Number(_, _)
            | SqlValue::SingleQuotedString(_)
            | SqlValue::DoubleQuotedString(_)
            | SqlValue::Boolean(_)
            | SqlValue::Null => Ok(()),
            other => Err(format!("unsupported literal '{}'", other)),
        },
        Expr::BinaryOp { left, op, right } => {
            if !is_supported_operator(op) {
                return Err(format!("unsupported operator '{}'", op));
            }
            collect_columns(left, out)?;
            collect_columns(right, out)
        }
        Expr::UnaryOp { op, expr } => match op {
            UnaryOperator::Not | UnaryOperator::Minus | UnaryOperator::Plus => {
                collect_columns(expr, out)
            }
            other => Err(format!("unsupported operator '{}'", other)),
        },
        Expr::Nested(inner) | Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
            collect_columns(inner, out)
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_columns(expr, out)?;
            collect_columns(low, out)?;
            collect_columns(high, out)
        }
        Expr::InList { expr, list, .. } => {
            collect_columns(expr, out)?;
            list.iter().try_for_each(|item| collect_columns(item, out))
        }
        other => Err(format!("unsupported construct '{}'", other)),
    }
}

fn is_supported_operator(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq
            | BinaryOperator::And
            | BinaryOperator::Or
            | BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo
    )
}

struct EvalContext<'a> {
    source: &'a str,
    indices: &'a [(&'a str, usize)],
}

impl EvalContext<'_> {
    fn invalid(&self, reason: String) -> ToolError {
        ToolError::InvalidExpression {
            expr: self.source.to_string(),
            reason,
        }
    }

    fn eval(&self, expr: &Expr, row: &[Value]) -> Result<Scalar, ToolError> {
        if let Some(name) = identifier_name(expr) {
            let idx = self
                .indices
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, idx)| *idx)
                .ok_or_else(|| ToolError::ColumnNotFound(name.clone()))?;
            return Ok(scalar_from_cell(&row[idx]));
        }

        match expr {
            Expr::Value(v) => Ok(scalar_from_literal(&v.value)),
            Expr::Nested(inner) => self.eval(inner, row),
            Expr::IsNull(inner) => Ok(Scalar::Bool(self.eval(inner, row)? == Scalar::Null)),
            Expr::IsNotNull(inner) => Ok(Scalar::Bool(self.eval(inner, row)? != Scalar::Null)),
            Expr::UnaryOp { op, expr } => {
                let value = self.eval(expr, row)?;
                match op {
                    UnaryOperator::Not => Ok(from_tristate(self.truth(&value)?.map(|b| !b))),
                    UnaryOperator::Minus => Ok(to_number(&value)
                        .map(|n| Scalar::Number(-n))
                        .unwrap_or(Scalar::Null)),
                    UnaryOperator::Plus => {
                        Ok(to_number(&value).map(Scalar::Number).unwrap_or(Scalar::Null))
                    }
                    other => Err(self.invalid(format!("unsupported operator '{}'", other))),
                }
            }
            Expr::BinaryOp { left, op, right } => {
                let l = self.eval(left, row)?;
                let r = self.eval(right, row)?;
                self.binary(op, l, r)
            }
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let value = self.eval(expr, row)?;
                let low = self.eval(low, row)?;
                let high = self.eval(high, row)?;
                let above = compare(&value, &low).map(|o| o != Ordering::Less);
                let below = compare(&value, &high).map(|o| o != Ordering::Greater);
                let inside = and3(above, below);
                Ok(from_tristate(if *negated { inside.map(|b| !b) } else { inside }))
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let value = self.eval(expr, row)?;
                let mut found = Some(false);
                for item in list {
                    let item = self.eval(item, row)?;
                    match compare(&value, &item) {
                        Some(Ordering::Equal) => {
                            found = Some(true);
                            break;
                        }
                        Some(_) => {}
                        None => found = None,
                    }
                }
                Ok(from_tristate(if *negated { found.map(|b| !b) } else { found }))
            }
            other => Err(self.invalid(format!("unsupported construct '{}'", other))),
        }
    }

    fn binary(&self, op: &BinaryOperator, l: Scalar, r: Scalar) -> Result<Scalar, ToolError> {
        let ordering = || compare(&l, &r);
        let scalar = match op {
            BinaryOperator::Eq => from_tristate(ordering().map(|o| o == Ordering::Equal)),
            BinaryOperator::NotEq => from_tristate(ordering().map(|o| o != Ordering::Equal)),
            BinaryOperator::Lt => from_tristate(ordering().map(|o| o == Ordering::Less)),
            BinaryOperator::LtEq => from_tristate(ordering().map(|o| o != Ordering::Greater)),
            BinaryOperator::Gt => from_tristate(ordering().map(|o| o == Ordering::Greater)),
            BinaryOperator::GtEq => from_tristate(ordering().map(|o| o != Ordering::Less)),
            BinaryOperator::And => from_tristate(and3(self.truth(&l)?, self.truth(&r)?)),
            BinaryOperator::Or => from_tristate(or3(self.truth(&l)?, self.truth(&r)?)),
            BinaryOperator::Plus => arithmetic(&l, &r, |a, b| Some(a + b)),
            BinaryOperator::Minus => arithmetic(&l, &r, |a, b| Some(a - b)),
            BinaryOperator::Multiply => arithmetic(&l, &r, |a, b| Some(a * b)),
            BinaryOperator::Divide => arithmetic(&l, &r, |a, b| (b != 0.0).then(|| a / b)),
            BinaryOperator::Modulo => arithmetic(&l, &r, |a, b| (b != 0.0).then(|| a % b)),
            other => return Err(self.invalid(format!("unsupported operator '{}'", other))),
        };
        Ok(scalar)
    }

    fn truth(&self, value: &Scalar) -> Result<Option<bool>, ToolError> {
        match value {
            Scalar::Bool(b) => Ok(Some(*b)),
            Scalar::Null => Ok(None),
            other => Err(self.invalid(format!(
                "logical operator applied to a non-boolean value ({:?})",
                other
            ))),
        }
    }
}

fn scalar_from_cell(cell: &Value) -> Scalar {
    match cell {
        Value::Null => Scalar::Null,
        Value::Text(s) => Scalar::Text(s.clone()),
        Value::Number(n) => Scalar::Number(*n),
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Date(_) => Scalar::Text(cell.to_string()),
    }
}

fn scalar_from_literal(value: &SqlValue) -> Scalar {
    match value {
        SqlValue::Number(n, _) => n.parse::<f64>().map(Scalar::Number).unwrap_or(Scalar::Null),
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
            Scalar::Text(s.clone())
        }
        SqlValue::Boolean(b) => Scalar::Bool(*b),
        _ => Scalar::Null,
    }
}

fn to_number(value: &Scalar) -> Option<f64> {
    match value {
        Scalar::Number(n) => Some(*n),
        Scalar::Text(s) => parse_number(&Value::Text(s.clone())),
        _ => None,
    }
}

/// Ordering between two operands, `None` when unknown (null or incomparable).
/// A numeric side pulls the other one through the numeric coercion, so
/// "1,200" > 0 behaves like 1200 > 0.
fn compare(l: &Scalar, r: &Scalar) -> Option<Ordering> {
    match (l, r) {
        (Scalar::Null, _) | (_, Scalar::Null) => None,
        (Scalar::Number(_), _) | (_, Scalar::Number(_)) => {
            to_number(l)?.partial_cmp(&to_number(r)?)
        }
        (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
        (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn arithmetic(l: &Scalar, r: &Scalar, f: impl Fn(f64, f64) -> Option<f64>) -> Scalar {
    match (to_number(l), to_number(r)) {
        (Some(a), Some(b)) => f(a, b)
            .filter(|n| n.is_finite())
            .map(Scalar::Number)
            .unwrap_or(Scalar::Null),
        _ => Scalar::Null,
    }
}

fn and3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn from_tristate(value: Option<bool>) -> Scalar {
    value.map(Scalar::Bool).unwrap_or(Scalar::Null)
}
