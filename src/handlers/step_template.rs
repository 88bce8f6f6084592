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

use crate::entities::{Props, StepTemplateInput, StepTemplateOutput};
use crate::errors::ApiError;
use crate::handlers::common::{created_response, ok_response, validate_input, Envelope, Operation};
use crate::services::step_template::{CreateStepTemplateInput, PatchStepTemplateInput};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStepTemplateRequest {
    #[validate(length(min = 1))]
    pub template_id: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<StepTemplateInput>,
    #[serde(default)]
    pub outputs: Vec<StepTemplateOutput>,
    #[serde(default)]
    pub metadata: Props,
}

impl From<CreateStepTemplateRequest> for CreateStepTemplateInput {
    fn from(req: CreateStepTemplateRequest) -> Self {
        Self {
            template_id: req.template_id,
            name: req.name,
            description: req.description,
            inputs: req.inputs,
            outputs: req.outputs,
            metadata: req.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PatchStepTemplateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Option<Vec<StepTemplateInput>>,
    #[serde(default)]
    pub outputs: Option<Vec<StepTemplateOutput>>,
    #[serde(default)]
    pub metadata: Option<Props>,
}

impl From<PatchStepTemplateRequest> for PatchStepTemplateInput {
    fn from(req: PatchStepTemplateRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            inputs: req.inputs,
            outputs: req.outputs,
            metadata: req.metadata,
        }
    }
}

fn operations(template_id: &str) -> Vec<Operation> {
    vec![
        Operation::new(
            "update",
            "PATCH",
            format!("/api/step-template/{template_id}"),
        ),
        Operation::new(
            "delete",
            "DELETE",
            format!("/api/step-template/{template_id}"),
        ),
    ]
}

fn envelope(
    template_id: &str,
    tpl: crate::entities::StepTemplate,
) -> Envelope<crate::entities::StepTemplate> {
    Envelope::new(
        format!("/api/step-template/{template_id}"),
        tpl,
        operations(template_id),
    )
}

async fn create_step_template(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStepTemplateRequest>,
) -> Result<Response, ApiError> {
    validate_input(&req)?;
    let tpl = state.step_templates.create(req.into()).await?;
    Ok(created_response(envelope(&tpl.template_id, tpl)))
}

async fn get_step_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> Result<Response, ApiError> {
    let tpl = state.step_templates.get(&template_id).await?;
    Ok(ok_response(envelope(&template_id, tpl)))
}

async fn patch_step_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
    Json(req): Json<PatchStepTemplateRequest>,
) -> Result<Response, ApiError> {
    let tpl = state
        .step_templates
        .patch(&template_id, req.into())
        .await?;
    Ok(ok_response(envelope(&template_id, tpl)))
}

async fn delete_step_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> Result<Response, ApiError> {
    state.step_templates.delete(&template_id).await?;
    Ok(ok_response(json!({
        "status": "deleted",
        "template_id": template_id,
    })))
}

pub fn step_template_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/step-templates", post(create_step_template))
        .route(
            "/step-template/:template_id",
            get(get_step_template)
                .patch(patch_step_template)
                .delete(delete_step_template),
        )
}
