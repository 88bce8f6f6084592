use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
    Router,
};
use dotenv::dotenv;
use inventorius_api::{config, router, AppState};
use serde_json::json;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = config::load_config()?;
    config::init_tracing(&config.log_level, config.log_json);

    info!("inventorius-api starting...");

    let port = config.port;
    let state = AppState::new(config);

    let middleware = ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let app: Router = router()
        .fallback(not_found)
        .layer(middleware)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
