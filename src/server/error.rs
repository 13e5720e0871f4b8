//! Errors returned by application endpoints, rendered as JSON `{error}`

use crate::deps::ProbeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Server is shutting down")]
    Draining,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Document store is not connected")]
    DocumentStoreUnavailable,

    #[error("Failed to insert document: {0}")]
    Insert(#[source] ProbeError),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Draining => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::DocumentStoreUnavailable | ApiError::Insert(_) | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
