//! Thin handlers over [`crate::services::catalog`] — enough surface to seed
//! SKUs, bins, and batches ahead of a mixture or step-instance request.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::entities::Props;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, ok_response, validate_input};
use crate::services::catalog::{CreateBatchInput, CreateBinInput, CreateSkuInput, DepositInput};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSkuRequest {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBinRequest {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchRequest {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub sku_id: String,
    pub qty_remaining: rust_decimal::Decimal,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub codes: Vec<String>,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DepositRequest {
    #[validate(length(min = 1))]
    pub id: String,
    pub quantity: rust_decimal::Decimal,
}

async fn create_sku(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSkuRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let sku = state
        .catalog
        .create_sku(CreateSkuInput {
            id: req.id,
            name: req.name,
            props: req.props,
        })
        .await?;
    Ok(created_response(sku))
}

async fn create_bin(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBinRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let bin = state
        .catalog
        .create_bin(CreateBinInput {
            id: req.id,
            props: req.props,
        })
        .await?;
    Ok(created_response(bin))
}

async fn create_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBatchRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let batch = state
        .catalog
        .create_batch(CreateBatchInput {
            id: req.id,
            sku_id: req.sku_id,
            qty_remaining: req.qty_remaining,
            name: req.name,
            codes: req.codes,
            props: req.props,
        })
        .await?;
    Ok(created_response(batch))
}

async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Response, ApiError> {
    let batch = state.catalog.get_batch(&batch_id).await?;
    Ok(ok_response(batch))
}

async fn deposit_into_bin(
    State(state): State<Arc<AppState>>,
    Path(bin_id): Path<String>,
    Json(req): Json<DepositRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let bin = state
        .catalog
        .deposit_into_bin(
            &bin_id,
            DepositInput {
                id: req.id,
                quantity: req.quantity,
            },
        )
        .await?;
    Ok(created_response(bin))
}

pub fn catalog_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/skus", post(create_sku))
        .route("/bins", post(create_bin))
        .route("/bin/:bin_id/contents", post(deposit_into_bin))
        .route("/batches", post(create_batch))
        .route("/batch/:batch_id", get(get_batch))
}
