//! Operator setup status from parameter values.

use serde_json::{Map, Value};

use crate::core::Status;

/// Parameters wired by the pipeline itself rather than filled in by users.
const STRUCTURAL_PARAMETERS: [&str; 2] = ["dataset", "target"];

/// Computes an operator's status from its parameters.
///
/// `Setted up` once every task parameter except the structural ones has a
/// non-empty value, `Unset` otherwise.
#[must_use]
pub fn setup_status(task_parameters: &[String], parameters: &Map<String, Value>) -> Status {
    let complete = task_parameters
        .iter()
        .filter(|name| !STRUCTURAL_PARAMETERS.contains(&name.as_str()))
        .all(|name| parameters.get(name).is_some_and(has_value));

    if complete {
        Status::SettedUp
    } else {
        Status::Unset
    }
}

fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}
