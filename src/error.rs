//! ==============================================================================
//! error.rs - error taxonomy for the sampling pipeline
//! ==============================================================================
//!
//! purpose:
//!     one error type shared by the store, sampler, query service and
//!     projector. the web layer maps each variant to an http status.
//!
//! relationships:
//!     - produced by: sensor.rs, store.rs, query.rs, projector.rs
//!     - consumed by: server.rs (IntoResponse), sampler.rs (logged and dropped)
//!
//! ==============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// sensor read failed or timed out
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// storage backend unreachable or rejected the command
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// a record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// history was requested while sampling is turned off
    #[error("historical data is disabled")]
    FeatureDisabled,

    /// a reading reached the projector without an expected value
    #[error("reading is missing field `{0}`")]
    MissingField(&'static str),

    /// history length must be at least one
    #[error("history length must be positive, got {0}")]
    InvalidLength(usize),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::FeatureDisabled => StatusCode::NOT_FOUND,
            CoreError::InvalidLength(_) => StatusCode::BAD_REQUEST,
            CoreError::SensorUnavailable(_) | CoreError::StorageUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CoreError::Serialization(_) | CoreError::MissingField(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
