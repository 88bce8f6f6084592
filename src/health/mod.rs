//! Liveness endpoint. The store is in-process, so there is no external
//! dependency to probe — this mirrors the donor's `simple_health_check`,
//! dropped down to just that since the database/Redis checks it also
//! offered don't apply here.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::info;

pub async fn health_check() -> impl IntoResponse {
    info!("health check endpoint called");
    (
        StatusCode::OK,
        Json(json!({
            "status": "up",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

pub fn health_routes() -> Router<std::sync::Arc<crate::AppState>> {
    Router::new().route("/", get(health_check))
}
