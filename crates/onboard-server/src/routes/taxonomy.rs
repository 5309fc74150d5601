use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/roles — active roles in picker order.
pub async fn list_roles(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let taxonomy = onboard_core::taxonomy::Taxonomy::load(&root)?;
        let mut roles: Vec<&onboard_core::role::Role> =
            taxonomy.roles.iter().filter(|r| r.active).collect();
        roles.sort_by_key(|r| r.sort_order);
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&roles)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/roles/:role/categories — active categories of a role.
pub async fn list_categories(
    State(app): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let taxonomy = onboard_core::taxonomy::Taxonomy::load(&root)?;
        let categories = taxonomy.categories_for(&role)?;
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&categories)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/categories/:category/levels — levels of a category, possibly
/// empty for level-independent categories.
pub async fn list_levels(
    State(app): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let taxonomy = onboard_core::taxonomy::Taxonomy::load(&root)?;
        let levels = taxonomy.levels_for(&category)?;
        Ok::<_, onboard_core::OnboardError>(serde_json::to_value(&levels)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct StagesQuery {
    #[serde(default)]
    pub level: Option<String>,
}

/// GET /api/categories/:category/stages?level=… — the ordered flow for a
/// selection, including form schemas and requirements.
pub async fn list_stages(
    State(app): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<StagesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let taxonomy = onboard_core::taxonomy::Taxonomy::load(&root)?;
        let flow = taxonomy.flow(&category, query.level.as_deref())?;
        Ok::<_, onboard_core::OnboardError>(serde_json::json!({
            "flow": flow.name,
            "steps": flow.steps,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
