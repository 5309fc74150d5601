pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf) -> Router {
    let app_state = state::AppState::new(root);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Taxonomy
        .route("/api/roles", get(routes::taxonomy::list_roles))
        .route(
            "/api/roles/{role}/categories",
            get(routes::taxonomy::list_categories),
        )
        .route(
            "/api/categories/{category}/levels",
            get(routes::taxonomy::list_levels),
        )
        .route(
            "/api/categories/{category}/stages",
            get(routes::taxonomy::list_stages),
        )
        // Progress
        .route("/api/progress/start", post(routes::progress::start))
        .route(
            "/api/progress/{user}/{role}",
            get(routes::progress::snapshot),
        )
        .route(
            "/api/progress/{user}/{role}/complete",
            post(routes::progress::complete),
        )
        .route(
            "/api/progress/{user}/{role}/back",
            post(routes::progress::back),
        )
        .route(
            "/api/progress/{user}/{role}/skip",
            post(routes::progress::skip),
        )
        .route(
            "/api/progress/{user}/{role}/reset",
            post(routes::progress::reset),
        )
        // Config
        .route("/api/config", get(routes::config::get_config))
        .layer(cors)
        .with_state(app_state)
}

/// Start the onboarding API server.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let app = build_router(root);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("onboard API listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
