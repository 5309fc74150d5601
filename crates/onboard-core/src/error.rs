use thiserror::Error;

/// All errors produced by onboard-core.
#[derive(Debug, Error)]
pub enum OnboardError {
    #[error("not an onboard workspace (run 'onboard init' first)")]
    NotInitialized,

    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("role category not found: {0}")]
    CategoryNotFound(String),

    #[error("role level not found: {0}")]
    LevelNotFound(String),

    #[error("stage not found: {0}")]
    StageNotFound(String),

    #[error("no onboarding progress for user '{user}' in role '{role}'")]
    ProgressNotFound { user: String, role: String },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("prerequisite not met for stage '{stage}': {condition}")]
    PrerequisiteNotMet { stage: String, condition: String },

    #[error("invalid slug: '{0}' (must be lowercase alphanumeric, '-' or '_')")]
    InvalidSlug(String),

    #[error("broken stage chain in flow '{flow}': {reason}")]
    BrokenChain { flow: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OnboardError>;
