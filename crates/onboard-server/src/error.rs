use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use onboard_core::OnboardError;

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Wraps `anyhow::Error` and maps
/// `OnboardError` variants onto statuses; the JSON body carries the error
/// message plus a stable `kind` so clients can dispatch without parsing
/// text.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

/// Error family reported in the response body.
fn kind_of(err: &OnboardError) -> &'static str {
    match err {
        OnboardError::NotInitialized => "not_initialized",
        OnboardError::RoleNotFound(_)
        | OnboardError::CategoryNotFound(_)
        | OnboardError::LevelNotFound(_)
        | OnboardError::StageNotFound(_)
        | OnboardError::ProgressNotFound { .. } => "not_found",
        OnboardError::InvalidSelection(_) => "invalid_selection",
        OnboardError::PrerequisiteNotMet { .. } => "prerequisite_not_met",
        OnboardError::InvalidSlug(_) => "invalid_request",
        OnboardError::BrokenChain { .. }
        | OnboardError::Storage(_)
        | OnboardError::Io(_)
        | OnboardError::Yaml(_)
        | OnboardError::Json(_) => "storage",
    }
}

fn status_of(err: &OnboardError) -> StatusCode {
    match err {
        OnboardError::NotInitialized | OnboardError::InvalidSlug(_) => StatusCode::BAD_REQUEST,
        OnboardError::RoleNotFound(_)
        | OnboardError::CategoryNotFound(_)
        | OnboardError::LevelNotFound(_)
        | OnboardError::StageNotFound(_)
        | OnboardError::ProgressNotFound { .. } => StatusCode::NOT_FOUND,
        OnboardError::InvalidSelection(_) | OnboardError::PrerequisiteNotMet { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OnboardError::BrokenChain { .. }
        | OnboardError::Storage(_)
        | OnboardError::Io(_)
        | OnboardError::Yaml(_)
        | OnboardError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match self.0.downcast_ref::<OnboardError>() {
            Some(err) => (status_of(err), kind_of(err)),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": kind,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
