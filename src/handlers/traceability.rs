use std::sync::Arc;

use axum::{extract::State, response::Response, routing::post, Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::errors::ApiError;
use crate::handlers::common::{ok_response, validate_input};
use crate::services::traceability;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TraceabilityRequest {
    #[serde(default)]
    pub batch_ids: Vec<String>,
    #[serde(default)]
    pub step_instance_ids: Vec<String>,
}

async fn traceability_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TraceabilityRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let result =
        traceability::query(state.store.clone(), req.batch_ids, req.step_instance_ids).await?;
    Ok(ok_response(result))
}

pub fn traceability_routes() -> Router<Arc<AppState>> {
    Router::new().route("/traceability", post(traceability_query))
}
