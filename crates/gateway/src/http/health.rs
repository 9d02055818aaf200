//! `GET /api/health`, `/api/capabilities`, `/api/system/profile` (§4.8) —
//! all three are unauthenticated liveness/introspection probes. Grounded
//! on `api/admin.rs::system_info`'s plain `Json(json!({...}))` style.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn capabilities(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::to_value(&*state.capabilities).unwrap())
}

pub async fn system_profile() -> impl IntoResponse {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let tier = if cores >= 8 { "large" } else if cores >= 4 { "medium" } else { "small" };
    Json(serde_json::json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cpuCores": cores,
        "recommendedModelTier": tier,
    }))
}

/// Probe for the external binaries [`crate::state::Capabilities`] caches —
/// `which`-style presence checks, run once at startup and never again.
pub fn probe_capabilities() -> crate::state::Capabilities {
    let has = |bin: &str| {
        std::env::var_os("PATH")
            .map(|paths| {
                std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file())
            })
            .unwrap_or(false)
    };
    crate::state::Capabilities {
        chromium: has("chromium") || has("chromium-browser") || has("google-chrome"),
        ffmpeg: has("ffmpeg"),
        poppler: has("pdftoppm"),
    }
}
