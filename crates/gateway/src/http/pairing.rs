//! Pairing + gateway identity routes (§4.2, §4.8). `start`/`confirm`/
//! `public_info`/`pair_page` are unauthenticated by design — pairing is
//! how a device gets its first token. `gateway_info`/`list_tokens`/
//! `revoke_token` require an already-paired bearer token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use serde::Deserialize;
use spaceduck_auth::ConfirmOutcome;

use crate::http::errors::ApiError;
use crate::state::AppState;

pub async fn public_info(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let settings = state.auth.ensure_gateway_settings().await?;
    Ok(Json(serde_json::json!({
        "id": settings.id,
        "name": settings.name,
        "requiresAuth": state.config.current().server.auth_required,
    })))
}

pub async fn gateway_info(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let settings = state.auth.ensure_gateway_settings().await?;
    Ok(Json(serde_json::json!({
        "id": settings.id,
        "name": settings.name,
        "createdAt": settings.created_at,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

pub async fn start(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let result = state.auth.create_pairing_session().await?;
    let code_hint = format!("••{}", &result.code[result.code.len().saturating_sub(2)..]);
    Ok(Json(serde_json::json!({ "pairingId": result.pairing_id, "codeHint": code_hint })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pairing_id: String,
    code: String,
    #[serde(default)]
    device_name: Option<String>,
}

pub async fn confirm(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> Response {
    match state.auth.confirm_pairing(&body.pairing_id, &body.code, body.device_name).await {
        Ok(ConfirmOutcome::Ok { token, gateway_id, gateway_name }) => {
            Json(serde_json::json!({ "token": token, "gatewayId": gateway_id, "gatewayName": gateway_name }))
                .into_response()
        }
        Ok(ConfirmOutcome::WrongCode) => err(StatusCode::UNAUTHORIZED, "wrong_code"),
        Ok(ConfirmOutcome::Expired) => err(StatusCode::GONE, "expired"),
        Ok(ConfirmOutcome::RateLimited) => err(StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        Ok(ConfirmOutcome::NotFound) => err(StatusCode::NOT_FOUND, "not_found"),
        Ok(ConfirmOutcome::AlreadyUsed) => err(StatusCode::UNAUTHORIZED, "already_used"),
        Err(e) => ApiError(e).into_response(),
    }
}

fn err(status: StatusCode, code: &'static str) -> Response {
    (status, Json(serde_json::json!({ "error": code }))).into_response()
}

pub async fn pair_page(State(state): State<AppState>) -> impl IntoResponse {
    let result = state.auth.create_pairing_session().await;
    let body = match result {
        Ok(r) => format!(
            "<!doctype html><html><body><h1>Pairing code</h1><p style=\"font-size:2rem\">{}</p></body></html>",
            r.code
        ),
        Err(_) => "<!doctype html><html><body><h1>Pairing unavailable</h1></body></html>".to_string(),
    };
    Html(body)
}

pub async fn list_tokens(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tokens = state.auth.list_tokens().await?;
    Ok(Json(tokens))
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    id: String,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(body): Json<RevokeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.revoke_token(&body.id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
