use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised by the store and service layer. Carries enough detail for
/// `ApiError` to build the wire-facing problem document without re-deriving it.
#[derive(Debug, Error, Clone)]
pub enum ServiceError {
    #[error("sku not found: {0}")]
    MissingSku(String),

    #[error("bin not found: {0}")]
    MissingBin(String),

    #[error("batch not found: {0}")]
    MissingBatch(String),

    #[error("mixture not found: {0}")]
    MissingMixture(String),

    #[error("step template not found: {0}")]
    MissingStepTemplate(String),

    #[error("step instance not found: {0}")]
    MissingStepInstance(String),

    #[error("{kind} already exists: {id}")]
    DuplicateResource { kind: &'static str, id: String },

    #[error("insufficient quantity: requested {requested}, available {available}")]
    InsufficientQuantity {
        requested: String,
        available: String,
    },

    #[error("invalid params: {0}")]
    InvalidParams(String),
}

/// Problem document returned to clients, per RFC 7807 conventions.
#[derive(Debug, Serialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "invalid-params")]
    pub invalid_params: Option<Vec<InvalidParam>>,
}

#[derive(Debug, Serialize)]
pub struct InvalidParam {
    pub name: String,
    pub reason: String,
}

/// The edge-facing error type. Wraps `ServiceError` and adds the variants that
/// only make sense at the HTTP boundary (malformed bodies, validation failure).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("invalid params")]
    Validation(Vec<InvalidParam>),

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, title, detail, invalid_params) = match self {
            ApiError::Service(ServiceError::MissingSku(id)) => (
                StatusCode::NOT_FOUND,
                "missing-sku",
                "Sku not found",
                format!("no sku with id {id}"),
                None,
            ),
            ApiError::Service(ServiceError::MissingBin(id)) => (
                StatusCode::NOT_FOUND,
                "missing-bin",
                "Bin not found",
                format!("no bin with id {id}"),
                None,
            ),
            ApiError::Service(ServiceError::MissingBatch(id)) => (
                StatusCode::NOT_FOUND,
                "missing-batch",
                "Batch not found",
                format!("no batch with id {id}"),
                None,
            ),
            ApiError::Service(ServiceError::MissingMixture(id)) => (
                StatusCode::NOT_FOUND,
                "missing-mixture",
                "Mixture not found",
                format!("no mixture with id {id}"),
                None,
            ),
            ApiError::Service(ServiceError::MissingStepTemplate(id)) => (
                StatusCode::NOT_FOUND,
                "missing-step-template",
                "Step template not found",
                format!("no step template with id {id}"),
                None,
            ),
            ApiError::Service(ServiceError::MissingStepInstance(id)) => (
                StatusCode::NOT_FOUND,
                "missing-step-instance",
                "Step instance not found",
                format!("no step instance with id {id}"),
                None,
            ),
            ApiError::Service(ServiceError::DuplicateResource { kind, id }) => (
                StatusCode::CONFLICT,
                "duplicate-resource",
                "Resource already exists",
                format!("{kind} {id} already exists"),
                None,
            ),
            ApiError::Service(ServiceError::InsufficientQuantity {
                requested,
                available,
            }) => (
                StatusCode::METHOD_NOT_ALLOWED,
                "insufficient-quantity",
                "Insufficient quantity",
                format!("requested {requested}, only {available} available"),
                None,
            ),
            ApiError::Service(ServiceError::InvalidParams(detail)) => (
                StatusCode::BAD_REQUEST,
                "invalid-params",
                "Invalid parameters",
                detail,
                None,
            ),
            ApiError::Validation(params) => (
                StatusCode::BAD_REQUEST,
                "invalid-params",
                "Invalid parameters",
                "one or more fields failed validation".to_string(),
                Some(params),
            ),
            ApiError::MalformedBody(detail) => (
                StatusCode::BAD_REQUEST,
                "malformed-body",
                "Malformed request body",
                detail,
                None,
            ),
        };

        let body = ProblemDetail {
            kind: kind.to_string(),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
            invalid_params,
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let params = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| InvalidParam {
                    name: field.to_string(),
                    reason: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        ApiError::Validation(params)
    }
}
