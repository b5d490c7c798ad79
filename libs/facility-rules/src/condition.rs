//! Condition predicates
//!
//! `rule.conditions` maps a row field to either a scalar (equality) or an
//! operator object:
//!
//! ```text
//! { "runtime_hours": { "operator": ">=", "value": 5000 },
//!   "asset_type": "boiler" }
//! ```
//!
//! All entries are AND-combined; an empty map matches every row.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Result, RuleError};
use crate::store::Row;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
}

impl ComparisonOperator {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "==" | "=" | "eq" => Some(Self::Equal),
            "!=" | "ne" => Some(Self::NotEqual),
            ">" | "gt" => Some(Self::GreaterThan),
            ">=" | "gte" => Some(Self::GreaterThanOrEqual),
            "<" | "lt" => Some(Self::LessThan),
            "<=" | "lte" => Some(Self::LessThanOrEqual),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Contains => " contains ",
        }
    }
}

/// Single field predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ComparisonOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Evaluate against a row. Missing fields and type mismatches are false.
    pub fn matches(&self, row: &Row) -> bool {
        match row.get(&self.field) {
            Some(actual) => compare_values(actual, &self.value, self.operator),
            None => false,
        }
    }

    /// Trigger description including the observed value, e.g. `runtime_hours>=5000 (6120)`
    pub fn describe(&self, row: &Row) -> String {
        match row.get(&self.field) {
            Some(actual) => format!("{} ({})", self, display_value(actual)),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.field,
            self.operator.symbol(),
            display_value(&self.value)
        )
    }
}

/// Parse a rule's condition map
pub fn parse_conditions(map: &Map<String, Value>) -> Result<Vec<Condition>> {
    let mut conditions = Vec::with_capacity(map.len());

    for (field, spec) in map {
        if field.trim().is_empty() {
            return Err(RuleError::validation("condition field name is empty"));
        }

        let condition = match spec {
            Value::Object(obj) => {
                let op = obj
                    .get("operator")
                    .and_then(Value::as_str)
                    .unwrap_or("==");
                let operator = ComparisonOperator::parse(op).ok_or_else(|| {
                    RuleError::validation(format!(
                        "condition '{}': unknown operator '{}'",
                        field, op
                    ))
                })?;
                let value = obj.get("value").cloned().ok_or_else(|| {
                    RuleError::validation(format!("condition '{}': missing value", field))
                })?;
                if value.is_object() || value.is_array() {
                    return Err(RuleError::validation(format!(
                        "condition '{}': value must be a scalar",
                        field
                    )));
                }
                Condition::new(field.clone(), operator, value)
            },
            Value::Array(_) => {
                return Err(RuleError::validation(format!(
                    "condition '{}': arrays are not supported",
                    field
                )))
            },
            scalar => Condition::new(field.clone(), ComparisonOperator::Equal, scalar.clone()),
        };

        conditions.push(condition);
    }

    Ok(conditions)
}

/// True when every condition matches
pub fn all_match(conditions: &[Condition], row: &Row) -> bool {
    conditions.iter().all(|c| c.matches(row))
}

/// Format conditions as an expression string (e.g., "days_overdue>=3 && status==open")
pub fn format_conditions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" && ")
}

fn compare_values(actual: &Value, expected: &Value, operator: ComparisonOperator) -> bool {
    if let ComparisonOperator::Contains = operator {
        return match (actual, expected.as_str()) {
            (Value::String(s), Some(needle)) => s.contains(needle),
            (Value::Array(items), _) => items.iter().any(|item| item == expected),
            _ => false,
        };
    }

    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return match operator {
            ComparisonOperator::Equal => (a - b).abs() < f64::EPSILON,
            ComparisonOperator::NotEqual => (a - b).abs() >= f64::EPSILON,
            ComparisonOperator::GreaterThan => a > b,
            ComparisonOperator::GreaterThanOrEqual => a >= b,
            ComparisonOperator::LessThan => a < b,
            ComparisonOperator::LessThanOrEqual => a <= b,
            ComparisonOperator::Contains => false,
        };
    }

    match (actual, expected) {
        (Value::String(a), Value::String(b)) => match operator {
            ComparisonOperator::Equal => a == b,
            ComparisonOperator::NotEqual => a != b,
            ComparisonOperator::GreaterThan => a > b,
            ComparisonOperator::GreaterThanOrEqual => a >= b,
            ComparisonOperator::LessThan => a < b,
            ComparisonOperator::LessThanOrEqual => a <= b,
            ComparisonOperator::Contains => false,
        },
        (Value::Bool(a), Value::Bool(b)) => match operator {
            ComparisonOperator::Equal => a == b,
            ComparisonOperator::NotEqual => a != b,
            _ => false,
        },
        (Value::Null, _) | (_, Value::Null) => match operator {
            ComparisonOperator::Equal => actual.is_null() && expected.is_null(),
            ComparisonOperator::NotEqual => actual.is_null() != expected.is_null(),
            _ => false,
        },
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
