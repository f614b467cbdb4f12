use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::errors::AttestorError;

impl IntoResponse for AttestorError {
    fn into_response(self) -> axum::response::Response {
        let class = self.classify();
        let status = StatusCode::from_u16(class.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if !self.is_client_error() {
            error!(code = class.code, error = %self, "Request failed");
        }
        (status, Json(json!({"error": self.to_string(), "code": class.code}))).into_response()
    }
}
