use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Require a bearer token (or a paired session token) on protected
    /// routes. Disabling this is only meant for local development — the
    /// gateway logs a warning at startup when it's off.
    #[serde(default = "d_true")]
    pub auth_required: bool,
    /// Maximum accepted body size for `/api/upload` and `/api/stt/transcribe`.
    #[serde(default = "d_upload_max_bytes")]
    pub upload_max_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            auth_required: true,
            upload_max_bytes: d_upload_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsConfig {
    /// Origins echoed back in `Access-Control-Allow-Origin`. Permissive by
    /// default — every response echoes the request's `Origin` and exposes
    /// `ETag`/`If-Match`.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_port() -> u16 {
    7337
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_true() -> bool {
    true
}
fn d_upload_max_bytes() -> u64 {
    25 * 1024 * 1024
}
fn d_cors_origins() -> Vec<String> {
    vec!["*".into()]
}
