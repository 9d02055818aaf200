//! HTTP Router (C10, §4.8). Grounded on `api/mod.rs`'s public/protected
//! `Router` split and `route_layer(middleware::from_fn_with_state)` bearer
//! auth gate, re-purposed onto this system's pairing/config/conversation
//! surface instead of the teacher's node/session/skills routes.

pub mod config;
pub mod conversations;
pub mod errors;
pub mod health;
pub mod pairing;
pub mod stt;
pub mod tasks;
pub mod tools;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::state::AppState;

/// Paired-device bearer-token gate for the authenticated surface (§4.8,
/// §4.2): unlike the teacher's single pinned admin-token hash
/// (`api/auth.rs::require_api_token`), every token here is one issued by
/// `POST /api/pair/confirm` and checked against the live auth store so a
/// revoked token stops working immediately. `server.auth_required = false`
/// is dev mode — every request passes unauthenticated.
pub async fn require_auth_token(
    axum::extract::State(state): axum::extract::State<AppState>,
    req: axum::extract::Request,
    next: middleware::Next,
) -> axum::response::Response {
    if !state.config.current().server.auth_required {
        return next.run(req).await;
    }
    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    match state.auth.verify_token(provided).await {
        Ok(Some(_)) => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Unauthorized"})),
        )
            .into_response(),
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/capabilities", get(health::capabilities))
        .route("/api/system/profile", get(health::system_profile))
        .route("/api/gateway/public-info", get(pairing::public_info))
        .route("/api/pair/start", post(pairing::start))
        .route("/api/pair/confirm", post(pairing::confirm))
        .route("/pair", get(pairing::pair_page));

    let protected = Router::new()
        .route("/api/gateway/info", get(pairing::gateway_info))
        .route("/api/tokens", get(pairing::list_tokens))
        .route("/api/tokens/revoke", post(pairing::revoke_token))
        .route("/api/conversations", get(conversations::list))
        .route("/api/upload", post(conversations::upload))
        .route("/api/config", get(config::get_config))
        .route("/api/config", patch(config::patch_config))
        .route("/api/config/secrets", post(config::secrets))
        .route("/api/config/provider-status", get(config::provider_status))
        .route("/api/config/provider-test", post(config::provider_test))
        .route("/api/config/embedding-status", get(config::embedding_status))
        .route("/api/tools/status", get(tools::status))
        .route("/api/tools/test", post(tools::test))
        .route("/api/stt/transcribe", post(stt::transcribe))
        .route("/api/tasks", post(tasks::create))
        .route("/api/tasks", get(tasks::list))
        .route("/api/tasks/budget", get(tasks::budget))
        .route("/api/tasks/:id", get(tasks::get))
        .route("/api/tasks/:id", delete(tasks::delete))
        .route("/api/tasks/:id/retry", post(tasks::retry))
        .route("/api/tasks/:id/runs", get(tasks::runs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth_token));

    public
        .merge(protected)
        .layer(tower_http::cors::CorsLayer::permissive().expose_headers([
            axum::http::HeaderName::from_static("etag"),
            axum::http::HeaderName::from_static("if-match"),
        ]))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
