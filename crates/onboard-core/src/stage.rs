use crate::error::{OnboardError, Result};
use crate::requirement::Requirement;
use crate::types::{FieldKind, StageKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// FormField
// ---------------------------------------------------------------------------

/// One input collected by a stage's form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Valid choices for select / multi_select fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FormField {
    /// Check a submitted value against this field's declaration.
    /// Returns a problem description, or None if the value is acceptable.
    pub fn check(&self, value: Option<&Value>) -> Option<String> {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => {
                if self.required {
                    return Some(format!("required field '{}' is missing", self.name));
                }
                return None;
            }
        };

        match self.kind {
            FieldKind::Text => {
                if value.as_str().is_none() {
                    return Some(format!("field '{}' must be a string", self.name));
                }
            }
            FieldKind::Email => match value.as_str() {
                Some(s) if s.contains('@') && !s.starts_with('@') && !s.ends_with('@') => {}
                Some(_) => {
                    return Some(format!("field '{}' must be an email address", self.name));
                }
                None => return Some(format!("field '{}' must be a string", self.name)),
            },
            FieldKind::Number => {
                if !value.is_number() {
                    return Some(format!("field '{}' must be a number", self.name));
                }
            }
            FieldKind::Boolean => {
                if value.as_bool().is_none() {
                    return Some(format!("field '{}' must be a boolean", self.name));
                }
            }
            FieldKind::Select => match value.as_str() {
                Some(s) if self.options.iter().any(|o| o == s) => {}
                Some(s) => {
                    return Some(format!("'{}' is not an option for field '{}'", s, self.name));
                }
                None => return Some(format!("field '{}' must be a string", self.name)),
            },
            FieldKind::MultiSelect => match value.as_array() {
                Some(items) => {
                    for item in items {
                        match item.as_str() {
                            Some(s) if self.options.iter().any(|o| o == s) => {}
                            Some(s) => {
                                return Some(format!(
                                    "'{}' is not an option for field '{}'",
                                    s, self.name
                                ));
                            }
                            None => {
                                return Some(format!(
                                    "field '{}' must be a list of strings",
                                    self.name
                                ));
                            }
                        }
                    }
                }
                None => return Some(format!("field '{}' must be a list", self.name)),
            },
        }
        None
    }
}

// ---------------------------------------------------------------------------
// StageDefinition
// ---------------------------------------------------------------------------

/// One step of an onboarding flow. Stages belong to a category, optionally
/// scoped to a level, and are ordered both by `sort_order` and by explicit
/// `prev`/`next` links that must agree with that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<String>,
    #[serde(default)]
    pub sort_order: u32,
    #[serde(default)]
    pub kind: StageKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl StageDefinition {
    /// Validate a submitted step output against this stage's form schema.
    /// Unknown extra keys are allowed; declared fields must conform.
    pub fn validate_output(&self, output: &Map<String, Value>) -> Result<()> {
        for field in &self.form_fields {
            if let Some(problem) = field.check(output.get(&field.name)) {
                return Err(OnboardError::PrerequisiteNotMet {
                    stage: self.id.clone(),
                    condition: problem,
                });
            }
        }
        Ok(())
    }
}

fn default_active() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
