use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::upstream::UpstreamError;

/// Failures reported synchronously, before any downstream byte is written.
///
/// Once streaming has started nothing is reported through this type; the
/// downstream body simply ends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The caller failed the authorization check.
    #[error("unauthorized")]
    Unauthorized,
    /// The inbound payload did not parse or failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The upstream could not be opened or rejected the request.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<relay_core::ValidationError> for RelayError {
    fn from(value: relay_core::ValidationError) -> Self {
        RelayError::InvalidRequest(value.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
