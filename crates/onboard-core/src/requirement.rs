use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Requirement
// ---------------------------------------------------------------------------

/// A precondition attached to a stage. All requirements of a stage must hold
/// before the stage can be completed; conditional stages may be skipped
/// while at least one requirement is unmet.
///
/// Serialized with an explicit `kind` tag so taxonomy files stay readable:
///
/// ```yaml
/// requirements:
///   - kind: field_truthy
///     field: actively_hiring
///   - kind: stage_complete
///     stage: account_setup
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    /// The named profile field exists and is not null.
    FieldPresent { field: String },
    /// The named profile field is truthy (non-empty string, non-zero
    /// number, true, non-empty array or object).
    FieldTruthy { field: String },
    /// The named profile field equals an expected value exactly.
    FieldEquals { field: String, expected: Value },
    /// Another stage of the same flow is in the completed set.
    StageComplete { stage: String },
    /// Every stage earlier in the chain is in the completed set.
    AllPreviousComplete,
}

/// Everything a requirement can be evaluated against: the accumulated
/// profile fields, the completed-stage set, and the ids of stages earlier
/// in the chain than the stage under evaluation.
pub struct EvalContext<'a> {
    pub fields: &'a Map<String, Value>,
    pub completed: &'a BTreeSet<String>,
    pub earlier_stages: &'a [String],
}

impl Requirement {
    pub fn is_met(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Requirement::FieldPresent { field } => {
                ctx.fields.get(field).is_some_and(|v| !v.is_null())
            }
            Requirement::FieldTruthy { field } => ctx.fields.get(field).is_some_and(is_truthy),
            Requirement::FieldEquals { field, expected } => {
                ctx.fields.get(field) == Some(expected)
            }
            Requirement::StageComplete { stage } => ctx.completed.contains(stage),
            Requirement::AllPreviousComplete => ctx
                .earlier_stages
                .iter()
                .all(|id| ctx.completed.contains(id)),
        }
    }

    /// Profile field this requirement reads, if any. Drives cascading
    /// invalidation after a correction.
    pub fn referenced_field(&self) -> Option<&str> {
        match self {
            Requirement::FieldPresent { field }
            | Requirement::FieldTruthy { field }
            | Requirement::FieldEquals { field, .. } => Some(field),
            Requirement::StageComplete { .. } | Requirement::AllPreviousComplete => None,
        }
    }

    /// Stage id this requirement reads, if any.
    pub fn referenced_stage(&self) -> Option<&str> {
        match self {
            Requirement::StageComplete { stage } => Some(stage),
            _ => None,
        }
    }

    /// Human-readable condition text, used in prerequisite errors.
    pub fn describe(&self) -> String {
        match self {
            Requirement::FieldPresent { field } => format!("field '{field}' must be provided"),
            Requirement::FieldTruthy { field } => {
                format!("field '{field}' must have a non-empty value")
            }
            Requirement::FieldEquals { field, expected } => {
                format!("field '{field}' must equal {expected}")
            }
            Requirement::StageComplete { stage } => {
                format!("stage '{stage}' must be completed first")
            }
            Requirement::AllPreviousComplete => "all previous stages must be completed".to_string(),
        }
    }
}

/// Truthiness over JSON values. Empty strings, zero, false, null and empty
/// collections are falsy, everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
