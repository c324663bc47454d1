//! HTTP mapping of data-access errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::error::DataAccessError;

/// Handler error wrapper; the status comes from [`DataAccessError::http_status`]
#[derive(Debug)]
pub struct AppError(pub DataAccessError);

impl From<DataAccessError> for AppError {
    fn from(error: DataAccessError) -> Self {
        Self(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(kind = %self.0.kind(), "Request failed: {}", self.0);
        }
        let body = json!({
            "error": self.0.to_string(),
            "kind": self.0.kind().to_string(),
        });
        (status, Json(body)).into_response()
    }
}
