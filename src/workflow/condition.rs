//! Predicate evaluation over execution state.
//!
//! A [`Condition`] names a dot-notation field path (`queryResult.rowCount`),
//! an operator and an optional comparison value. Paths resolve against the
//! camelCase JSON view of [`ExecutionState`]; a path that does not resolve
//! yields "undefined", which every operator handles without failing.
//!
//! Ordering operators (`gt`, `lt`, `gte`, `lte`) compare numerically when
//! both sides are numbers or numeric strings, lexicographically when both
//! sides are non-numeric strings, and are `false` for anything else.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

use crate::state::ExecutionState;

/// Comparison operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionOperator {
    Exists,
    NotExists,
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    /// Operator name not recognized; always evaluates to `false`
    Unknown(String),
}

impl ConditionOperator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Unknown(name) => name,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl From<String> for ConditionOperator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "exists" => Self::Exists,
            "not_exists" => Self::NotExists,
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "lt" => Self::Lt,
            "gte" => Self::Gte,
            "lte" => Self::Lte,
            "contains" => Self::Contains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            _ => Self::Unknown(name),
        }
    }
}

impl From<&str> for ConditionOperator {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<ConditionOperator> for String {
    fn from(op: ConditionOperator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{field, operator, value}` predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: impl Into<ConditionOperator>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, ConditionOperator::Exists)
    }

    pub fn not_exists(field: impl Into<String>) -> Self {
        Self::new(field, ConditionOperator::NotExists)
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::Eq).with_value(value)
    }

    /// Evaluate against a state, logging a warning for unknown operators.
    pub fn evaluate(&self, state: &ExecutionState) -> bool {
        evaluate(state, self)
    }

    /// Short label for diagrams and logs, e.g. `error not_exists`
    pub fn label(&self) -> String {
        match &self.value {
            Some(value) => format!("{} {} {}", self.field, self.operator, value),
            None => format!("{} {}", self.field, self.operator),
        }
    }
}

/// Evaluate a condition against a state.
///
/// Total: returns a boolean for every input and never panics.
pub fn evaluate(state: &ExecutionState, condition: &Condition) -> bool {
    let root = state.to_value();
    evaluate_value(&root, condition)
}

/// Evaluate a condition against an arbitrary JSON document.
pub fn evaluate_value(root: &Value, condition: &Condition) -> bool {
    let field = resolve_field(root, &condition.field);
    let expected = condition.value.as_ref();

    match &condition.operator {
        ConditionOperator::Exists => is_defined(field),
        ConditionOperator::NotExists => !is_defined(field),
        ConditionOperator::Eq => match (field, expected) {
            (Some(actual), Some(expected)) => json_equals(actual, expected),
            (None, None) => true,
            (Some(actual), None) => actual.is_null(),
            (None, Some(expected)) => expected.is_null(),
        },
        ConditionOperator::Ne => {
            let eq = Condition {
                operator: ConditionOperator::Eq,
                ..condition.clone()
            };
            !evaluate_value(root, &eq)
        }
        ConditionOperator::Gt => compare(field, expected) == Some(Ordering::Greater),
        ConditionOperator::Lt => compare(field, expected) == Some(Ordering::Less),
        ConditionOperator::Gte => matches!(
            compare(field, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ConditionOperator::Lte => matches!(
            compare(field, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ConditionOperator::Contains => {
            string_test(field, expected, |haystack, needle| haystack.contains(needle))
        }
        ConditionOperator::StartsWith => {
            string_test(field, expected, |haystack, needle| haystack.starts_with(needle))
        }
        ConditionOperator::EndsWith => {
            string_test(field, expected, |haystack, needle| haystack.ends_with(needle))
        }
        ConditionOperator::Unknown(name) => {
            warn!(operator = %name, field = %condition.field, "Unknown condition operator, evaluating to false");
            false
        }
    }
}

/// Resolve a dot-notation path. Any missing segment short-circuits to `None`.
pub fn resolve_field<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut current = root;
    for part in path.split('.') {
        current = match current {
            Value::Object(obj) => obj.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Null is treated the same as a missing field.
fn is_defined(value: Option<&Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}

fn json_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn compare(field: Option<&Value>, expected: Option<&Value>) -> Option<Ordering> {
    let (field, expected) = (field?, expected?);

    if let (Some(a), Some(b)) = (as_number(field), as_number(expected)) {
        return a.partial_cmp(&b);
    }

    match (field, expected) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_test(
    field: Option<&Value>,
    expected: Option<&Value>,
    test: impl Fn(&str, &str) -> bool,
) -> bool {
    match (field, expected) {
        (Some(field), Some(expected)) if !field.is_null() && !expected.is_null() => {
            test(&stringify(field), &stringify(expected))
        }
        _ => false,
    }
}
