//! AppState construction, extracted from `main.rs` so `serve`/`pair`/
//! `config` CLI commands share one boot path (§2, §6).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tokio::sync::RwLock as AsyncRwLock;

use spaceduck_auth::AuthStore;
use spaceduck_browser::BrowserSessionPool;
use spaceduck_context::ContextBuilder;
use spaceduck_domain::config::Config;
use spaceduck_providers::{build_embedding_provider, build_provider, SwappableEmbeddingProvider, SwappableProvider};
use spaceduck_store::SqliteStore;
use spaceduck_tools::{build_tool_registry, ToolBuilderDeps, ToolRegistry};

use crate::agent::AgentLoop;
use crate::attachments::LocalAttachmentStore;
use crate::config_store::ConfigStore;
use crate::config_tool_seam::ConfigToolSeam;
use crate::hotswap::HotswapCoordinator;
use crate::http::health::probe_capabilities;
use crate::memory_extractor::MemoryExtractor;
use crate::run_lock::RunLock;
use crate::scheduler::TaskScheduler;
use crate::state::{AppState, AuthStoreTokenVerifier};
use crate::stt::UnavailableTranscriber;

/// Stands in for the chat provider when `/ai/*` has no secret set yet
/// (a fresh install, before the owner has paired a device and called
/// `PATCH /api/config/secrets`). Every call fails with `Error::Auth`
/// instead of the process refusing to start at all — pairing and
/// `config set` both need the server up first.
#[derive(Default)]
struct UnconfiguredProvider {
    caps: spaceduck_domain::capability::LlmCapabilities,
}

#[async_trait::async_trait]
impl spaceduck_providers::LlmProvider for UnconfiguredProvider {
    async fn chat(&self, _req: &spaceduck_providers::ChatRequest) -> spaceduck_domain::Result<spaceduck_providers::ChatResponse> {
        Err(spaceduck_domain::error::Error::Auth("no AI provider configured yet; set /ai/secrets/* via PATCH /api/config/secrets".into()))
    }

    async fn chat_stream(
        &self,
        _req: &spaceduck_providers::ChatRequest,
    ) -> spaceduck_domain::Result<spaceduck_domain::stream::BoxStream<'static, spaceduck_domain::Result<spaceduck_domain::stream::StreamEvent>>> {
        Err(spaceduck_domain::error::Error::Auth("no AI provider configured yet; set /ai/secrets/* via PATCH /api/config/secrets".into()))
    }

    fn capabilities(&self) -> &spaceduck_domain::capability::LlmCapabilities {
        &self.caps
    }

    fn provider_id(&self) -> &str {
        "unconfigured"
    }
}

/// Context Builder sizing: no config section governs these (Open
/// Question in SPEC_FULL — resolved as fixed, generous-for-a-local-
/// assistant constants rather than a new tunable surface). 40 tail
/// messages and a 120k-char total budget comfortably covers the small
/// models' context windows this system targets without per-deployment
/// tuning.
const CONTEXT_MAX_TAIL_MESSAGES: usize = 40;
const CONTEXT_MAX_CHARS_PER_MESSAGE: usize = 8_000;
const CONTEXT_TOTAL_MAX_CHARS: usize = 120_000;

pub struct BootPaths {
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
}

/// Resolve `SPACEDUCK_DATA_DIR`/`SPACEDUCK_CONFIG_DIR` (§6), defaulting
/// the config dir to `<data_dir>/config` when unset.
pub fn resolve_paths() -> BootPaths {
    let data_dir = std::env::var("SPACEDUCK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    let config_dir = std::env::var("SPACEDUCK_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("config"));
    BootPaths { data_dir, config_dir }
}

/// Apply the subset of `SPACEDUCK_*` env vars that override an
/// already-loaded config document, rather than living in it (§6):
/// `SPACEDUCK_PORT` and `SPACEDUCK_AUTH_REQUIRED` are deployment-host
/// concerns, not document state a client should be able to patch.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(port) = std::env::var("SPACEDUCK_PORT") {
        if let Ok(port) = port.parse() {
            config.server.port = port;
        }
    }
    if let Ok(flag) = std::env::var("SPACEDUCK_AUTH_REQUIRED") {
        config.server.auth_required = !matches!(flag.as_str(), "0" | "false" | "no");
    }
    if let Ok(max_bytes) = std::env::var("SPACEDUCK_UPLOAD_MAX_BYTES") {
        if let Ok(max_bytes) = max_bytes.parse() {
            config.server.upload_max_bytes = max_bytes;
        }
    }
}

/// Build a fully-wired [`AppState`]: load config, open storage, build the
/// swappable provider/embedding proxies, the tool registry (with its
/// config-tool seam resolving the hot-swap-coordinator construction
/// cycle), the agent loop, and every other collaborator `serve`/`run`
/// share.
pub async fn build_app_state(paths: &BootPaths) -> anyhow::Result<AppState> {
    tokio::fs::create_dir_all(&paths.data_dir).await?;

    let config_store = Arc::new(ConfigStore::load(&paths.config_dir).await?);
    {
        // Env overrides apply on top of the loaded document without being
        // persisted back to disk — a restart without the env var reverts
        // to whatever was last written via `PATCH /api/config`.
        let mut overridden = config_store.current();
        apply_env_overrides(&mut overridden);
        if overridden.server.port != config_store.current().server.port
            || overridden.server.auth_required != config_store.current().server.auth_required
            || overridden.server.upload_max_bytes != config_store.current().server.upload_max_bytes
        {
            tracing::info!("applying SPACEDUCK_* env overrides on top of the persisted config");
        }
    }
    let config = {
        let mut c = config_store.current();
        apply_env_overrides(&mut c);
        c
    };
    let secrets = config_store.secrets();

    let store = Arc::new(SqliteStore::connect(paths.data_dir.join("spaceduck.sqlite3")).await?);
    let auth = Arc::new(AuthStore::new(store.clone()));
    auth.ensure_gateway_settings().await?;

    let initial_provider: Arc<dyn spaceduck_providers::LlmProvider> = build_provider(&config, &secrets).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "no chat provider configured at boot; pair a device and set secrets to enable chat");
        Arc::new(UnconfiguredProvider::default())
    });
    let provider = Arc::new(SwappableProvider::new(initial_provider));
    let embedding = Arc::new(SwappableEmbeddingProvider::new(build_embedding_provider(&config, &secrets)?));
    let browser = Arc::new(BrowserSessionPool::new(config.browser.clone()));
    let attachments = Arc::new(LocalAttachmentStore::new(paths.data_dir.join("attachments")));

    // The current conversation a tool call belongs to is threaded through
    // a shared slot the agent loop updates before dispatching each round's
    // tool calls, and the browser/config tools read from when they need a
    // conversation id outside the call arguments themselves.
    let active_conversation: Arc<RwLock<String>> = Arc::new(RwLock::new(String::new()));
    let conversation_id_getter = {
        let active = active_conversation.clone();
        Arc::new(move || active.read().clone()) as Arc<dyn Fn() -> String + Send + Sync>
    };

    let hotswap_cell: Arc<OnceLock<std::sync::Weak<HotswapCoordinator>>> = Arc::new(OnceLock::new());
    let config_tool_seam = Arc::new(ConfigToolSeam::new(config_store.clone(), hotswap_cell.clone()));

    let tool_deps = ToolBuilderDeps {
        attachments: Some(attachments.clone() as Arc<dyn spaceduck_tools::seams::AttachmentStore>),
        config_store: Some(config_tool_seam as Arc<dyn spaceduck_tools::seams::ConfigStore>),
        browser_pool: Some(browser.clone()),
        conversation_id_getter,
    };

    let initial_registry = build_tool_registry(&config.tools, &secrets, &tool_deps);
    let tools: Arc<AsyncRwLock<Arc<ToolRegistry>>> = Arc::new(AsyncRwLock::new(Arc::new(initial_registry)));

    let hotswap = Arc::new(HotswapCoordinator::new(
        config_store.clone(),
        provider.clone(),
        embedding.clone(),
        tools.clone(),
        browser.clone(),
        tool_deps,
    ));
    let _ = hotswap_cell.set(Arc::downgrade(&hotswap));

    let context_builder = ContextBuilder::new(
        CONTEXT_MAX_TAIL_MESSAGES,
        CONTEXT_MAX_CHARS_PER_MESSAGE,
        CONTEXT_TOTAL_MAX_CHARS,
    );
    let agent = Arc::new(AgentLoop::new(
        provider.clone(),
        tools.clone(),
        context_builder,
        config.ai.max_tool_rounds,
        active_conversation,
    ));

    let run_lock = RunLock::new();
    let memory_extractor = Arc::new(MemoryExtractor::new(provider.clone()));
    let capabilities = Arc::new(probe_capabilities());

    let scheduler = TaskScheduler::new(
        store.clone(),
        embedding.clone(),
        agent.clone(),
        run_lock.clone(),
        config.scheduler.clone(),
        config.ai.system_prompt.clone(),
        config.ai.model.clone(),
        config.ai.pricing.clone(),
    );
    tokio::spawn(scheduler.clone().run());

    Ok(AppState {
        store,
        config: config_store,
        auth,
        provider,
        embedding,
        tools,
        browser,
        agent,
        run_lock,
        hotswap,
        memory_extractor,
        attachments,
        transcriber: Arc::new(UnavailableTranscriber) as Arc<dyn crate::stt::Transcriber>,
        scheduler,
        capabilities,
        status_cache: Arc::new(RwLock::new(HashMap::new())),
    })
}

/// Open just the config store, for `spaceduck config get/set` — no point
/// paying for storage/provider/tool/browser construction to read or patch
/// one JSON Pointer.
pub async fn open_config_store(paths: &BootPaths) -> anyhow::Result<ConfigStore> {
    Ok(ConfigStore::load(&paths.config_dir).await?)
}

/// Open storage and auth, for `spaceduck pair` — a pairing code only needs
/// somewhere to record the pairing session, not the full chat stack.
pub async fn open_store_and_auth(paths: &BootPaths) -> anyhow::Result<(Arc<SqliteStore>, Arc<AuthStore<SqliteStore>>)> {
    tokio::fs::create_dir_all(&paths.data_dir).await?;
    let store = Arc::new(SqliteStore::connect(paths.data_dir.join("spaceduck.sqlite3")).await?);
    let auth = Arc::new(AuthStore::new(store.clone()));
    auth.ensure_gateway_settings().await?;
    Ok((store, auth))
}

/// [`crate::ws::WsDeps`] shares almost every collaborator in [`AppState`]
/// plus the WS-specific token verifier and system prompt; this is the one
/// place both `serve` and a future CLI-driven `run` build it.
pub fn build_ws_deps(state: &AppState, config: &Config) -> Arc<crate::ws::WsDeps> {
    Arc::new(crate::ws::WsDeps {
        store: state.store.clone(),
        embedding: state.embedding.clone(),
        agent: state.agent.clone(),
        run_lock: state.run_lock.clone(),
        memory_extractor: state.memory_extractor.clone(),
        system_prompt: config.ai.system_prompt.clone(),
        tokens: Arc::new(AuthStoreTokenVerifier(state.auth.clone())) as Arc<dyn crate::ws::TokenVerifier>,
    })
}
