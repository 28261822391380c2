// Control plane error taxonomy
//
// Every failure a caller of the HTTP API can observe. Per-subscriber send
// failures are not here: they are recovered inside the registry and never
// reach a caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use locust_dashboard_core::{ParameterError, SampleError};
use thiserror::Error;

use crate::api::common::ErrorResponse;

/// Result type alias for control plane operations
pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Debug, Error)]
pub enum ControlError {
    /// A worker is running or stopping
    #[error("Locust already running.")]
    AlreadyRunning,

    /// No worker to stop
    #[error("Locust is not running.")]
    NotRunning,

    /// Missing, malformed or expired credential
    #[error("{0}")]
    Unauthorized(String),

    /// Request body is not valid JSON of the expected shape
    #[error("Malformed request body: {0}")]
    MalformedInput(String),

    /// Run parameters failed validation
    #[error("Invalid run parameters: {0}")]
    InvalidParameters(#[from] ParameterError),

    /// Metrics payload is not a JSON object; reported as a server error to the worker
    #[error("{0}")]
    InvalidSample(#[from] SampleError),

    /// The OS refused to launch the worker
    #[error("Failed to start Locust: {0}")]
    SpawnFailure(String),

    /// Anything else (signal delivery failures, task panics)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ControlError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ControlError::MalformedInput(msg.into())
    }

    pub fn spawn(msg: impl Into<String>) -> Self {
        ControlError::SpawnFailure(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ControlError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ControlError::AlreadyRunning
            | ControlError::NotRunning
            | ControlError::MalformedInput(_)
            | ControlError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
            ControlError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ControlError::InvalidSample(_)
            | ControlError::SpawnFailure(_)
            | ControlError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
