//! `GET/PATCH /api/config`, `/api/config/secrets`, `/api/config/provider-*`,
//! `/api/config/embedding-status` (§4.8, §4.9). Grounded on the config
//! primitives in `crates/domain/src/config/*` via [`crate::config_store::ConfigStore`]
//! and the compare-and-swap rebuild discipline in [`crate::hotswap::HotswapCoordinator`].

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use spaceduck_domain::config::PatchOp;
use spaceduck_providers::{ChatRequest, EmbeddingsRequest};

use crate::http::errors::ApiError;
use crate::state::AppState;

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let (document, rev, secrets) = state.config.get_redacted();
    let mut headers = HeaderMap::new();
    headers.insert("etag", rev.parse().unwrap());
    (
        headers,
        Json(serde_json::json!({
            "config": document,
            "rev": rev,
            "secrets": secrets,
            "capabilities": &*state.capabilities,
        })),
    )
}

pub async fn patch_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(ops): Json<Vec<PatchOp>>,
) -> Response {
    let Some(if_match) = headers.get("if-match").and_then(|v| v.to_str().ok()) else {
        return (
            StatusCode::PRECONDITION_REQUIRED,
            Json(serde_json::json!({"error": "MISSING_IF_MATCH"})),
        )
            .into_response();
    };

    let outcome = match state.config.patch(ops, if_match).await {
        Ok(o) => o,
        Err(e) if e.code() == "CONFLICT" => {
            let (_, rev, _) = state.config.get_redacted();
            return (StatusCode::CONFLICT, Json(serde_json::json!({"error": "CONFLICT", "rev": rev}))).into_response();
        }
        Err(e) => return ApiError(e).into_response(),
    };

    let warnings = state.hotswap.apply(&outcome.rebuild).await;
    Json(serde_json::json!({
        "rev": outcome.rev,
        "warnings": warnings.iter().map(|w| serde_json::json!({"code": w.code, "message": w.message})).collect::<Vec<_>>(),
        "needsRestart": outcome.needs_restart,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRequest {
    op: String,
    path: String,
    #[serde(default)]
    value: Option<String>,
}

pub async fn secrets(
    State(state): State<AppState>,
    Json(body): Json<SecretRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rebuild = match body.op.as_str() {
        "set" => {
            let value = body.value.ok_or_else(|| {
                ApiError(spaceduck_domain::error::Error::Validation("value is required for op=set".into()))
            })?;
            state.config.set_secret(&body.path, &value).await?
        }
        "unset" => state.config.unset_secret(&body.path).await?,
        other => {
            return Err(ApiError(spaceduck_domain::error::Error::Validation(format!("unknown op: {other}"))))
        }
    };
    let warnings = state.hotswap.apply(&rebuild).await;
    Ok(Json(serde_json::json!({
        "warnings": warnings.iter().map(|w| serde_json::json!({"code": w.code, "message": w.message})).collect::<Vec<_>>(),
    })))
}

pub async fn provider_status(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.current();
    let caps = state.provider.current().capabilities().clone();
    Json(serde_json::json!({
        "provider": config.ai.provider,
        "model": config.ai.model,
        "capabilities": caps,
    }))
}

pub async fn provider_test(State(state): State<AppState>) -> impl IntoResponse {
    let request = ChatRequest {
        messages: vec![spaceduck_domain::tool::Message::user("ping")],
        max_tokens: Some(1),
        ..Default::default()
    };
    match state.provider.current().chat(&request).await {
        Ok(_) => Json(serde_json::json!({"ok": true})),
        Err(e) => Json(serde_json::json!({"ok": false, "error": e.to_string()})),
    }
}

pub async fn embedding_status(State(state): State<AppState>) -> impl IntoResponse {
    let Some(embedder) = state.embedding.current() else {
        return Json(serde_json::json!({"enabled": false}));
    };
    let probe = embedder
        .embed(EmbeddingsRequest { input: vec!["ping".into()], model: None })
        .await;
    Json(serde_json::json!({
        "enabled": true,
        "providerId": embedder.provider_id(),
        "dimensions": embedder.dimensions(),
        "ok": probe.is_ok(),
    }))
}
