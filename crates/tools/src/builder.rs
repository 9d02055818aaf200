//! Tool registry builder (§4.3).
//!
//! A pure function of `(attachments?, config_store?, browser_pool?,
//! conversation_id_getter, secrets, tools_config)` that reads the current
//! config snapshot and registers exactly the tools whose gates are
//! satisfied. Called fresh every time `/tools/*` changes
//! ([`spaceduck_domain::config::TOOL_REBUILD_PATHS`] /
//! `TOOL_SECRET_PATHS`) — it never mutates an existing registry in place.

use std::sync::Arc;

use spaceduck_domain::config::{SecretsDocument, ToolsConfig, WebSearchProvider};
use spaceduck_providers::openai_compat::OpenAiCompatProvider;
use spaceduck_providers::LlmProvider;

use crate::browser_tools::{
    BrowserClickTool, BrowserNavigateTool, BrowserScreenshotTool, BrowserTypeTool,
};
use crate::chart::ChartTool;
use crate::config_tool::{ConfigGetTool, ConfigSetTool};
use crate::marker::MarkerScanTool;
use crate::registry::ToolRegistry;
use crate::seams::{AttachmentStore, ConfigStore};
use crate::web_answer::{FallbackAnswerTool, PerplexityAnswerTool};
use crate::web_fetch::WebFetchTool;
use crate::web_search::BraveSearchTool;

type ConversationIdGetter = Arc<dyn Fn() -> String + Send + Sync>;

/// Everything the builder needs beyond the config snapshot itself. Each
/// field is optional because the gateway may run without a browser pool,
/// without an attachment store, etc. — the builder degrades the tool set
/// accordingly rather than failing.
pub struct ToolBuilderDeps {
    pub attachments: Option<Arc<dyn AttachmentStore>>,
    pub config_store: Option<Arc<dyn ConfigStore>>,
    pub browser_pool: Option<Arc<spaceduck_browser::BrowserSessionPool>>,
    pub conversation_id_getter: ConversationIdGetter,
}

pub fn build_tool_registry(
    config: &ToolsConfig,
    secrets: &SecretsDocument,
    deps: &ToolBuilderDeps,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if config.web_fetch.enabled {
        match WebFetchTool::new(config.web_fetch.timeout_ms) {
            Ok(tool) => registry.register(Arc::new(tool)),
            Err(e) => tracing::warn!(error = %e, "failed to build web_fetch tool"),
        }
    }

    if config.browser.enabled {
        if let Some(pool) = &deps.browser_pool {
            let getter = deps.conversation_id_getter.clone();
            registry.register(Arc::new(BrowserNavigateTool::new(pool.clone(), getter.clone())));
            registry.register(Arc::new(BrowserClickTool::new(pool.clone(), getter.clone())));
            registry.register(Arc::new(BrowserTypeTool::new(pool.clone(), getter.clone())));
            registry.register(Arc::new(BrowserScreenshotTool::new(pool.clone(), getter)));
        } else {
            tracing::warn!("tools.browser.enabled but no browser pool was provided; skipping");
        }
    }

    let brave_key = secrets.get("/tools/secrets/braveApiKey").map(str::to_string);
    let web_search_tool: Option<Arc<BraveSearchTool>> =
        match (config.web_search.enabled, config.web_search.provider, &brave_key) {
            (true, WebSearchProvider::Brave, Some(key)) => {
                let tool = Arc::new(BraveSearchTool::new(key.clone()));
                registry.register(tool.clone());
                Some(tool)
            }
            _ => None,
        };

    if config.web_answer.enabled {
        let perplexity_key = secrets.get("/tools/secrets/perplexityApiKey").map(str::to_string);
        let openrouter_key = secrets.get("/tools/secrets/openrouterApiKey").map(str::to_string);

        if config.web_answer.use_perplexity {
            match perplexity_key {
                Some(key) => registry.register(Arc::new(PerplexityAnswerTool::new(key))),
                None => tracing::warn!(
                    "tools.webAnswer.usePerplexity but /tools/secrets/perplexityApiKey is unset; skipping web_answer"
                ),
            }
        } else {
            match (web_search_tool.clone(), openrouter_key) {
                (Some(search), Some(key)) => {
                    match OpenAiCompatProvider::new(
                        Some("https://openrouter.ai/api/v1"),
                        key,
                        "openai/gpt-4o-mini".to_string(),
                    ) {
                        Ok(provider) => {
                            let llm: Arc<dyn LlmProvider> = Arc::new(provider);
                            registry.register(Arc::new(FallbackAnswerTool::new(search, llm)));
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to build web_answer fallback provider"),
                    }
                }
                _ => tracing::warn!(
                    "tools.webAnswer enabled without Perplexity, but web_search or the openrouter fallback key is unavailable; skipping web_answer"
                ),
            }
        }
    }

    if config.marker.enabled {
        if let Some(attachments) = &deps.attachments {
            match MarkerScanTool::detect(&config.marker.binary_path, attachments.clone()) {
                Some(tool) => registry.register(Arc::new(tool)),
                None => tracing::warn!(
                    binary = %config.marker.binary_path,
                    "tools.marker.enabled but the marker binary was not found on PATH; skipping"
                ),
            }
        } else {
            tracing::warn!("tools.marker.enabled but no attachment store was provided; skipping");
        }
    }

    if let Some(store) = &deps.config_store {
        if config.config_tool.enabled {
            registry.register(Arc::new(ConfigGetTool::new(store.clone())));
            registry.register(Arc::new(ConfigSetTool::new(store.clone())));
        }
    }

    if config.chart.enabled {
        registry.register(Arc::new(ChartTool));
    }

    registry
}
