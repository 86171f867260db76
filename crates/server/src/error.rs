//! Server error type and HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by API handlers
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] dialwave_core::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        use dialwave_core::Error as Core;

        let (status, message) = match &self {
            ServerError::Core(Core::NotFound { .. }) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Core(Core::Validation(_)) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Core(Core::Compliance(_)) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::Core(Core::OutsideCallingHours) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ServerError::Core(Core::Provider(_)) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            ServerError::Core(Core::Store(_)) => {
                tracing::error!(error = %self, "store failure in handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
