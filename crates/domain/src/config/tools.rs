use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool gates — which built-in tools the registry builder may register.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    #[serde(default)]
    pub web_fetch: WebFetchConfig,
    #[serde(default)]
    pub browser: BrowserToolConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub web_answer: WebAnswerConfig,
    #[serde(default)]
    pub marker: MarkerConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub config_tool: ConfigToolConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_fetch: WebFetchConfig::default(),
            browser: BrowserToolConfig::default(),
            web_search: WebSearchConfig::default(),
            web_answer: WebAnswerConfig::default(),
            marker: MarkerConfig::default(),
            chart: ChartConfig::default(),
            config_tool: ConfigToolConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebFetchConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for WebFetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: d_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserToolConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Stream a live screencast of the session to connected clients.
    #[serde(default)]
    pub live_preview: bool,
}

impl Default for BrowserToolConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            live_preview: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebSearchProvider {
    Brave,
    None,
}

impl Default for WebSearchProvider {
    fn default() -> Self {
        WebSearchProvider::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: WebSearchProvider,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: WebSearchProvider::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAnswerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `true` = use Perplexity; `false` = fall back to web_search + LLM.
    #[serde(default)]
    pub use_perplexity: bool,
}

impl Default for WebAnswerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_perplexity: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Path to the external `marker` PDF-to-markdown binary.
    #[serde(default = "d_marker_binary")]
    pub binary_path: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary_path: d_marker_binary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigToolConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
}

impl Default for ConfigToolConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn d_true() -> bool {
    true
}
fn d_timeout_ms() -> u64 {
    15_000
}
fn d_marker_binary() -> String {
    "marker".into()
}

// JSON Pointer paths that trigger a tool-registry rebuild on patch (§4.9).
pub const TOOL_REBUILD_PATHS: &[&str] = &[
    "/tools/webSearch/enabled",
    "/tools/webSearch/provider",
    "/tools/webAnswer/enabled",
    "/tools/marker/enabled",
    "/tools/browser/enabled",
    "/tools/browser/livePreview",
    "/tools/webFetch/enabled",
];

/// Secret paths that also force a tool-registry rebuild when written.
pub const TOOL_SECRET_PATHS: &[&str] = &[
    "/tools/secrets/braveApiKey",
    "/tools/secrets/perplexityApiKey",
    "/tools/secrets/openrouterApiKey",
];
