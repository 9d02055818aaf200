//! Maps [`spaceduck_domain::error::Error`] to the HTTP status/body pair
//! every handler in this module returns on failure (§7's error taxonomy
//! table).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use spaceduck_domain::error::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code() {
            "VALIDATION" | "INVALID_PATH" | "INVALID_OP" | "INVALID_JSON" => StatusCode::BAD_REQUEST,
            "Unauthorized" => StatusCode::UNAUTHORIZED,
            "CONFLICT" => StatusCode::CONFLICT,
            "NOT_FOUND" | "TOOL_NOT_FOUND" => StatusCode::NOT_FOUND,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.code(), "message": self.0.to_string() }))).into_response()
    }
}
