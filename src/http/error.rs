use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::{R2rError, timestamp};

/// Terminal failure rendered as `{"error", "timestamp"}`.
#[derive(Debug)]
pub struct ApiError(pub R2rError);

impl From<R2rError> for ApiError {
    fn from(err: R2rError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": self.0.to_string(),
            "timestamp": timestamp(),
        });
        (status, Json(body)).into_response()
    }
}
