use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::entities::Props;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, ok_response, validate_input, Envelope, Operation};
use crate::services::step_instance::{
    ConsumeItemInput, CreateStepInstanceInput, PatchStepInstanceInput, ProduceItemInput,
};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStepInstanceRequest {
    #[serde(default)]
    pub instance_id: Option<String>,
    #[validate(length(min = 1))]
    pub template_id: String,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Props,
    pub consumed: Vec<ConsumeItemInput>,
    pub produced: Vec<ProduceItemInput>,
}

impl From<CreateStepInstanceRequest> for CreateStepInstanceInput {
    fn from(req: CreateStepInstanceRequest) -> Self {
        Self {
            instance_id: req.instance_id,
            template_id: req.template_id,
            operator: req.operator,
            notes: req.notes,
            metadata: req.metadata,
            consumed: req.consumed,
            produced: req.produced,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PatchStepInstanceRequest {
    #[serde(default)]
    pub operator: Option<Option<String>>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub metadata: Option<Props>,
}

impl From<PatchStepInstanceRequest> for PatchStepInstanceInput {
    fn from(req: PatchStepInstanceRequest) -> Self {
        Self {
            operator: req.operator,
            notes: req.notes,
            metadata: req.metadata,
        }
    }
}

fn operations(instance_id: &str) -> Vec<Operation> {
    vec![
        Operation::new(
            "update",
            "PATCH",
            format!("/api/step-instance/{instance_id}"),
        ),
        Operation::new(
            "delete",
            "DELETE",
            format!("/api/step-instance/{instance_id}"),
        ),
    ]
}

fn envelope(
    instance_id: &str,
    instance: crate::entities::StepInstance,
) -> Envelope<crate::entities::StepInstance> {
    Envelope::new(
        format!("/api/step-instance/{instance_id}"),
        instance,
        operations(instance_id),
    )
}

async fn create_step_instance(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStepInstanceRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let instance = state.step_executor.execute(req.into()).await?;
    Ok(created_response(envelope(&instance.instance_id, instance)))
}

async fn get_step_instance(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
) -> Result<Response, ApiError> {
    let instance = state.step_executor.get(&instance_id).await?;
    Ok(ok_response(envelope(&instance_id, instance)))
}

async fn patch_step_instance(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
    Json(req): Json<PatchStepInstanceRequest>,
) -> Result<Response, ApiError> {
    let instance = state
        .step_executor
        .patch(&instance_id, req.into())
        .await?;
    Ok(ok_response(envelope(&instance_id, instance)))
}

async fn delete_step_instance(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
) -> Result<Response, ApiError> {
    state.step_executor.delete(&instance_id).await?;
    Ok(ok_response(json!({
        "status": "deleted",
        "instance_id": instance_id,
    })))
}

pub fn step_instance_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/step-instances", post(create_step_instance))
        .route(
            "/step-instance/:instance_id",
            get(get_step_instance)
                .patch(patch_step_instance)
                .delete(delete_step_instance),
        )
}
