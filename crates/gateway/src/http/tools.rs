//! `GET /api/tools/status`, `POST /api/tools/test` (§4.8).

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use spaceduck_domain::tool::ToolCall;

use crate::http::errors::ApiError;
use crate::state::AppState;

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.tools.read().await;
    Json(serde_json::json!({
        "count": registry.size(),
        "tools": registry.get_definitions(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TestRequest {
    tool: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

pub async fn test(
    State(state): State<AppState>,
    Json(body): Json<TestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.tools.read().await;
    if !registry.has(&body.tool) {
        return Err(ApiError(spaceduck_domain::error::Error::ToolNotFound(body.tool)));
    }
    let call = ToolCall {
        call_id: uuid::Uuid::new_v4().to_string(),
        tool_name: body.tool,
        arguments: if body.arguments.is_null() { serde_json::json!({}) } else { body.arguments },
    };
    let result = registry.execute(&call).await;
    Ok(Json(serde_json::json!({
        "ok": !result.is_error,
        "content": result.content,
    })))
}
