use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ProgressStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a user's journey through one onboarding flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StageKind
// ---------------------------------------------------------------------------

/// How a stage participates in its flow.
///
/// Required stages block completion of the flow. Optional stages may always
/// be skipped. Conditional stages may be skipped only while their
/// requirements are unmet; once applicable they behave like required stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Required,
    Optional,
    Conditional,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Required => "required",
            StageKind::Optional => "optional",
            StageKind::Conditional => "conditional",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for StageKind {
    fn default() -> Self {
        StageKind::Required
    }
}

// ---------------------------------------------------------------------------
// FieldKind
// ---------------------------------------------------------------------------

/// Input type of a form field collected by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Number,
    Boolean,
    Select,
    MultiSelect,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Select => "select",
            FieldKind::MultiSelect => "multi_select",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for FieldKind {
    fn default() -> Self {
        FieldKind::Text
    }
}

// ---------------------------------------------------------------------------
// CheckWarning / WarnLevel
// ---------------------------------------------------------------------------

/// A finding produced by `Config::validate` or `Taxonomy::validate`.
/// `Error` findings describe data the engine will refuse at runtime,
/// `Warning` findings describe data that works but looks suspicious.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl fmt::Display for WarnLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarnLevel::Warning => f.write_str("warning"),
            WarnLevel::Error => f.write_str("error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serde_uses_snake_case() {
        let yaml = serde_yaml::to_string(&ProgressStatus::InProgress).unwrap();
        assert_eq!(yaml.trim(), "in_progress");
        let back: ProgressStatus = serde_yaml::from_str("completed").unwrap();
        assert_eq!(back, ProgressStatus::Completed);
    }

    #[test]
    fn stage_kind_defaults_to_required() {
        assert_eq!(StageKind::default(), StageKind::Required);
    }

    #[test]
    fn field_kind_display_matches_serde() {
        let yaml = serde_yaml::to_string(&FieldKind::MultiSelect).unwrap();
        assert_eq!(yaml.trim(), FieldKind::MultiSelect.as_str());
    }

    #[test]
    fn unknown_status_rejected() {
        let res: std::result::Result<ProgressStatus, _> = serde_yaml::from_str("paused");
        assert!(res.is_err());
    }
}
