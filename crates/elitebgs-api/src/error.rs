//! Error types for the query API.
//!
//! [`ApiError`] converts into an Axum response. Contract violations become
//! `400` with the reason; store failures become `500` with a generic
//! message while the detail goes to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use elitebgs_core::query::QueryError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A query parameter could not be parsed.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParam {
        /// Parameter name as sent.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The query engine rejected or failed the request.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ApiError {
    /// Build an [`ApiError::InvalidParam`].
    pub fn invalid(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidParam {
            name: name.to_owned(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParam { .. } => StatusCode::BAD_REQUEST,
            Self::Query(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "query failed");
            String::from("internal server error")
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
