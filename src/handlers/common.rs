//! Response envelope and validation helpers shared by every handler module.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::Validate;

use crate::errors::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub rel: &'static str,
    pub method: &'static str,
    pub href: String,
    #[serde(rename = "Expects-a", skip_serializing_if = "Option::is_none")]
    pub expects_a: Option<&'static str>,
}

impl Operation {
    pub fn new(rel: &'static str, method: &'static str, href: String) -> Self {
        Self {
            rel,
            method,
            href,
            expects_a: None,
        }
    }

    pub fn expects(mut self, shape: &'static str) -> Self {
        self.expects_a = Some(shape);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(rename = "Id")]
    pub id: String,
    pub state: T,
    pub operations: Vec<Operation>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(id: impl Into<String>, state: T, operations: Vec<Operation>) -> Self {
        Self {
            id: id.into(),
            state,
            operations,
        }
    }
}

pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input.validate().map_err(ApiError::from)
}

pub fn ok_response<T: Serialize>(body: T) -> Response {
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-cache")],
        Json(body),
    )
        .into_response()
}

pub fn created_response<T: Serialize>(body: T) -> Response {
    (
        StatusCode::CREATED,
        [(header::CACHE_CONTROL, "no-cache")],
        Json(body),
    )
        .into_response()
}
