use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::errors::ApiError;
use crate::handlers::common::{created_response, ok_response, validate_input, Envelope, Operation};
use crate::services::mixture::{
    AppendAuditInput, ComponentInput, CreateMixtureInput, DrawInput, SplitInput,
};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMixtureRequest {
    #[serde(default)]
    pub mix_id: Option<String>,
    #[validate(length(min = 1))]
    pub bin_id: String,
    #[validate(length(min = 1))]
    pub sku_id: String,
    #[validate(length(min = 1))]
    pub components: Vec<ComponentInput>,
    #[validate(length(min = 1))]
    pub created_by: String,
}

impl From<CreateMixtureRequest> for CreateMixtureInput {
    fn from(req: CreateMixtureRequest) -> Self {
        Self {
            mix_id: req.mix_id,
            bin_id: req.bin_id,
            sku_id: req.sku_id,
            components: req.components,
            created_by: req.created_by,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DrawRequest {
    pub quantity: rust_decimal::Decimal,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl From<DrawRequest> for DrawInput {
    fn from(req: DrawRequest) -> Self {
        Self {
            quantity: req.quantity,
            created_by: req.created_by,
            note: req.note,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SplitRequest {
    pub quantity: rust_decimal::Decimal,
    #[validate(length(min = 1))]
    pub destination_bin: String,
    #[serde(default)]
    pub new_mix_id: Option<String>,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl From<SplitRequest> for SplitInput {
    fn from(req: SplitRequest) -> Self {
        Self {
            quantity: req.quantity,
            destination_bin: req.destination_bin,
            new_mix_id: req.new_mix_id,
            created_by: req.created_by,
            note: req.note,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AppendAuditRequest {
    #[validate(length(min = 1))]
    pub created_by: String,
    #[validate(length(min = 1))]
    pub event: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub note: Option<String>,
}

impl From<AppendAuditRequest> for AppendAuditInput {
    fn from(req: AppendAuditRequest) -> Self {
        Self {
            created_by: req.created_by,
            event: req.event,
            details: req.details,
            note: req.note,
        }
    }
}

fn mixture_operations(mix_id: &str) -> Vec<Operation> {
    vec![
        Operation::new(
            "draw",
            "POST",
            format!("/api/mixture/{mix_id}/draw"),
        )
        .expects("mixture-draw-request"),
        Operation::new(
            "split",
            "POST",
            format!("/api/mixture/{mix_id}/split"),
        )
        .expects("mixture-split-request"),
        Operation::new(
            "append-audit",
            "POST",
            format!("/api/mixture/{mix_id}/audit"),
        )
        .expects("mixture-audit-request"),
    ]
}

fn envelope(mix_id: &str, mixture: crate::entities::Mixture) -> Envelope<crate::entities::Mixture> {
    Envelope::new(
        format!("/api/mixture/{mix_id}"),
        mixture,
        mixture_operations(mix_id),
    )
}

async fn create_mixture(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMixtureRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let mixture = state.mixtures.create(req.into()).await?;
    Ok(created_response(envelope(&mixture.mix_id, mixture)))
}

async fn get_mixture(
    State(state): State<Arc<AppState>>,
    Path(mix_id): Path<String>,
) -> Result<Response, ApiError> {
    let mixture = state.mixtures.get(&mix_id).await?;
    Ok(ok_response(envelope(&mix_id, mixture)))
}

async fn draw_mixture(
    State(state): State<Arc<AppState>>,
    Path(mix_id): Path<String>,
    Json(req): Json<DrawRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let mixture = state.mixtures.draw(&mix_id, req.into()).await?;
    Ok(ok_response(envelope(&mix_id, mixture)))
}

async fn split_mixture(
    State(state): State<Arc<AppState>>,
    Path(mix_id): Path<String>,
    Json(req): Json<SplitRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let outcome = state.mixtures.split(&mix_id, req.into()).await?;
    Ok(created_response(envelope(
        &outcome.created.mix_id.clone(),
        outcome.created,
    )))
}

async fn append_audit(
    State(state): State<Arc<AppState>>,
    Path(mix_id): Path<String>,
    Json(req): Json<AppendAuditRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let mixture = state.mixtures.append_audit(&mix_id, req.into()).await?;
    Ok(ok_response(envelope(&mix_id, mixture)))
}

pub fn mixture_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/mixtures", post(create_mixture))
        .route("/mixture/:mix_id", get(get_mixture))
        .route("/mixture/:mix_id/draw", post(draw_mixture))
        .route("/mixture/:mix_id/split", post(split_mixture))
        .route("/mixture/:mix_id/audit", post(append_audit))
}
