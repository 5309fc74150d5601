use axum::extract::{Path, State};
use axum::Json;
use onboard_core::orchestrator::Orchestrator;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartBody {
    pub user: String,
    pub role: String,
    pub category: String,
    #[serde(default)]
    pub level: Option<String>,
}

/// POST /api/progress/start — begin (or restart) onboarding for a
/// (user, role) pair.
pub async fn start(
    State(app): State<AppState>,
    Json(body): Json<StartBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut engine = Orchestrator::open(&root)?;
        let progress = engine.start(
            &body.user,
            &body.role,
            &body.category,
            body.level.as_deref(),
        )?;
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&progress)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/progress/:user/:role — current position, including the stage
/// definition for rendering the active form.
pub async fn snapshot(
    State(app): State<AppState>,
    Path((user, role)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let engine = Orchestrator::open(&root)?;
        let view = engine.snapshot(&user, &role)?;
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&view)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct CompleteBody {
    pub step: String,
    #[serde(default)]
    pub output: Map<String, Value>,
}

/// POST /api/progress/:user/:role/complete — submit a step's form output.
pub async fn complete(
    State(app): State<AppState>,
    Path((user, role)): Path<(String, String)>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut engine = Orchestrator::open(&root)?;
        let progress = engine.complete_step(&user, &role, &body.step, body.output)?;
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&progress)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/progress/:user/:role/back — step back one position.
pub async fn back(
    State(app): State<AppState>,
    Path((user, role)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut engine = Orchestrator::open(&root)?;
        let progress = engine.previous_step(&user, &role)?;
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&progress)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/progress/:user/:role/skip — skip the current stage where its
/// kind allows it.
pub async fn skip(
    State(app): State<AppState>,
    Path((user, role)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut engine = Orchestrator::open(&root)?;
        let progress = engine.skip_step(&user, &role)?;
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&progress)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/progress/:user/:role/reset — back to step 1 with an empty
/// completed set.
pub async fn reset(
    State(app): State<AppState>,
    Path((user, role)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut engine = Orchestrator::open(&root)?;
        let progress = engine.reset(&user, &role)?;
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&progress)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
