//! Hot-swap Coordinator (C11, §4.9): reacts to a successful config patch by
//! rebuilding exactly the collaborators the touched paths implicate, off to
//! the side, then atomically swapping each one in. A rebuild failure keeps
//! the previous collaborator live and is reported back as a warning — it
//! never blocks or rolls back the config write itself (Open Question,
//! resolved in `SPEC_FULL.md`).

use crate::config_store::ConfigStore;
use spaceduck_browser::BrowserSessionPool;
use spaceduck_domain::config::RebuildTarget;
use spaceduck_providers::{build_embedding_provider, build_provider, SwappableEmbeddingProvider, SwappableProvider};
use spaceduck_tools::{build_tool_registry, ToolBuilderDeps, ToolRegistry};
use std::sync::Arc;
use tokio::sync::RwLock as AsyncRwLock;

/// One rebuild attempt's outcome, folded into the `warnings[]` array
/// returned alongside a successful `PATCH /api/config` (§7: "hot-swap
/// failures never block the write").
#[derive(Debug, Clone)]
pub struct SwapWarning {
    pub code: &'static str,
    pub message: String,
}

pub struct HotswapCoordinator {
    config: Arc<ConfigStore>,
    provider: Arc<SwappableProvider>,
    embedding: Arc<SwappableEmbeddingProvider>,
    tools: Arc<AsyncRwLock<Arc<ToolRegistry>>>,
    browser: Arc<BrowserSessionPool>,
    tool_deps: ToolBuilderDeps,
}

impl HotswapCoordinator {
    pub fn new(
        config: Arc<ConfigStore>,
        provider: Arc<SwappableProvider>,
        embedding: Arc<SwappableEmbeddingProvider>,
        tools: Arc<AsyncRwLock<Arc<ToolRegistry>>>,
        browser: Arc<BrowserSessionPool>,
        tool_deps: ToolBuilderDeps,
    ) -> Self {
        Self { config, provider, embedding, tools, browser, tool_deps }
    }

    /// Rebuild exactly the collaborators named in `targets`, deduped by the
    /// caller (`ConfigStore::patch`/`set_secret` already dedupe). Channels
    /// and STT are logged, not rebuilt here — neither has a swappable proxy
    /// in this system yet (channels restart rather than proxy per §4.9;
    /// STT backend selection is read fresh per-request by the STT route).
    pub async fn apply(&self, targets: &[RebuildTarget]) -> Vec<SwapWarning> {
        let mut warnings = Vec::new();
        let config = self.config.current();
        let secrets = self.config.secrets();

        for target in targets {
            match target {
                RebuildTarget::Provider => match build_provider(&config, &secrets) {
                    Ok(new_provider) => {
                        self.provider.swap(new_provider);
                        tracing::info!(provider = ?config.ai.provider, "chat provider rebuilt");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "chat provider rebuild failed, keeping previous");
                        warnings.push(SwapWarning { code: "PROVIDER_REBUILD_FAILED", message: e.to_string() });
                    }
                },
                RebuildTarget::EmbeddingProvider => match build_embedding_provider(&config, &secrets) {
                    Ok(new_embedder) => {
                        self.embedding.swap(new_embedder);
                        tracing::info!("embedding provider rebuilt");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "embedding provider rebuild failed, keeping previous");
                        warnings.push(SwapWarning { code: "EMBEDDING_REBUILD_FAILED", message: e.to_string() });
                    }
                },
                RebuildTarget::ToolRegistry => {
                    let new_registry = build_tool_registry(&config.tools, &secrets, &self.tool_deps);
                    *self.tools.write().await = Arc::new(new_registry);
                    tracing::info!("tool registry rebuilt");
                }
                RebuildTarget::BrowserPool => {
                    self.browser.set_config(config.browser.clone());
                    tracing::info!("browser pool config applied");
                }
                RebuildTarget::Channels => {
                    tracing::info!("channels config changed; restart affected channel adapters");
                }
                RebuildTarget::SttBackend => {
                    tracing::info!("stt backend config changed; next transcribe call picks it up");
                }
            }
        }

        warnings
    }
}
