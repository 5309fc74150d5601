use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/config — product identity and engine settings.
pub async fn get_config(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let config = onboard_core::config::Config::load(&root)?;
        Ok::<_, onboard_core::OnboardError>(serde_json::json!({
            "version": config.version,
            "product": config.product,
            "flows": config.flows,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
