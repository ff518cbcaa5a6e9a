//! Error types for the serving layer
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Serve Error Enum ==
/// Why a chat request could not be answered normally.
///
/// A cache miss is not an error and never appears here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServeError {
    /// Memory is above the critical threshold; the request was refused before queuing
    #[error("Server temporarily overloaded (memory at {0:.1}%)")]
    Overloaded(f64),

    /// The request's result did not arrive before its deadline
    #[error("Request timed out after {}ms", .0.as_millis())]
    RequestTimeout(Duration),

    /// The inference backend failed for this request
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    /// Malformed request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == Inference Error Enum ==
/// Failure of one `generate` call, delivered through that request's result slot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// The backend returned an error or an unusable response
    #[error("Inference backend error: {0}")]
    Upstream(String),

    /// The backend could not be reached or the scheduler is stopped
    #[error("Inference unavailable: {0}")]
    Unavailable(String),

    /// The request's deadline passed while it was still queued
    #[error("Deadline passed before dispatch")]
    DeadlineExceeded,
}

// == IntoResponse Implementation ==
impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServeError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServeError::RequestTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServeError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            ServeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
pub type Result<T> = std::result::Result<T, ServeError>;
