//! Shared API types
//!
//! Success envelope and error mapping for the pipeline endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::pipeline::{PipelineError, PipelineResult};

/// Message carried by every successful pipeline response
pub const SUCCESS_MESSAGE: &str = "CDNN processed successfully";

/// Success envelope returned with HTTP 200
#[derive(Debug, Serialize)]
pub struct PipelineResponse {
    pub message: &'static str,
    pub result: PipelineResult,
}

impl PipelineResponse {
    pub fn new(result: PipelineResult) -> Self {
        Self {
            message: SUCCESS_MESSAGE,
            result,
        }
    }
}

/// Standard API error response.
///
/// Rendered as a plain-text body holding only the error message.
#[derive(Debug)]
pub enum ApiError {
    Internal { message: String },
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self::internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Internal { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}
