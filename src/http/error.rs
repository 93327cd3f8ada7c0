//! Mapping of `StoreError` onto HTTP responses.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::{json, Value};
use tracing::error;

use crate::StoreError;

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict(_) | Self::EmptyCart => StatusCode::CONFLICT,
            Self::Database(_) | Self::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::NotFound(_) => "Not found".to_string(),
            Self::Database(_) | Self::Migration(_) => {
                error!("request failed: {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let mut body = json!({ "status": "error", "message": message });
        if let Self::Validation(errors) = &self {
            body["errors"] = serde_json::to_value(errors).unwrap_or(Value::Null);
        }
        (status, Json(body)).into_response()
    }
}
