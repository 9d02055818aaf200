//! Shared application state passed to every HTTP/WS handler. Grounded on
//! the teacher's `AppState` shape (one `Clone`-able struct of `Arc`
//! collaborators, grouped by concern), re-wired onto this system's
//! components instead of the teacher's node/session/skills stack.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use spaceduck_auth::AuthStore;
use spaceduck_browser::BrowserSessionPool;
use spaceduck_providers::{SwappableEmbeddingProvider, SwappableProvider};
use spaceduck_store::SqliteStore;
use spaceduck_tools::ToolRegistry;
use tokio::sync::RwLock as AsyncRwLock;

use crate::agent::AgentLoop;
use crate::attachments::LocalAttachmentStore;
use crate::config_store::ConfigStore;
use crate::hotswap::HotswapCoordinator;
use crate::memory_extractor::MemoryExtractor;
use crate::run_lock::RunLock;
use crate::scheduler::TaskScheduler;
use crate::stt::Transcriber;
use crate::ws::TokenVerifier;

/// `GET /api/capabilities`'s probe result, cached for the process lifetime
/// (§4.8: "cached for process lifetime").
#[derive(Debug, Clone, serde::Serialize)]
pub struct Capabilities {
    pub chromium: bool,
    pub ffmpeg: bool,
    pub poppler: bool,
}

/// Short-lived cache for `/api/config/provider-status` and
/// `/api/tools/status` probes — avoid re-probing external services on
/// every request while still reflecting a config change within seconds.
#[derive(Clone)]
pub struct StatusCacheEntry {
    pub value: serde_json::Value,
    pub checked_at: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub config: Arc<ConfigStore>,
    pub auth: Arc<AuthStore<SqliteStore>>,

    pub provider: Arc<SwappableProvider>,
    pub embedding: Arc<SwappableEmbeddingProvider>,
    pub tools: Arc<AsyncRwLock<Arc<ToolRegistry>>>,
    pub browser: Arc<BrowserSessionPool>,

    pub agent: Arc<AgentLoop>,
    pub run_lock: Arc<RunLock>,
    pub hotswap: Arc<HotswapCoordinator>,
    pub memory_extractor: Arc<MemoryExtractor>,
    pub attachments: Arc<LocalAttachmentStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub scheduler: Arc<TaskScheduler>,

    pub capabilities: Arc<Capabilities>,
    pub status_cache: Arc<RwLock<std::collections::HashMap<String, StatusCacheEntry>>>,
}

/// Adapts [`AuthStore::verify_token`] to the narrow seam [`crate::ws`]
/// needs, so the WS dispatcher doesn't have to know about the concrete
/// `SqliteStore`-backed auth store.
pub struct AuthStoreTokenVerifier(pub Arc<AuthStore<SqliteStore>>);

#[async_trait::async_trait]
impl TokenVerifier for AuthStoreTokenVerifier {
    async fn verify(&self, raw_token: &str) -> Option<String> {
        self.0.verify_token(raw_token).await.ok().flatten().map(|t| t.id)
    }
}
