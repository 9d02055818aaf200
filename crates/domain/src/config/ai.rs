use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AI (LLM provider) configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which LLM backend the gateway talks to. Secrets (API keys) never live
/// here — they're read from the secret store at `/ai/secrets/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    Anthropic,
    OpenaiCompat,
    Gemini,
    Bedrock,
}

impl Default for AiProvider {
    fn default() -> Self {
        AiProvider::Anthropic
    }
}

impl AiProvider {
    /// The known secret path under `/ai/secrets/*` this provider needs.
    pub fn secret_path(self) -> &'static str {
        match self {
            AiProvider::Anthropic => "/ai/secrets/anthropicApiKey",
            AiProvider::OpenaiCompat => "/ai/secrets/openaiApiKey",
            AiProvider::Gemini => "/ai/secrets/geminiApiKey",
            AiProvider::Bedrock => "/ai/secrets/bedrockSecretAccessKey",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProvider,
    #[serde(default = "d_model")]
    pub model: String,
    /// Override base URL (self-hosted / proxy deployments).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bedrock region, ignored by other providers.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "d_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "d_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Per-model USD pricing, keyed by model name, for the Task Scheduler's
    /// budget guard (§4.12). A model with no entry here estimates $0 cost —
    /// its token usage still counts against `maxTokens`.
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            model: d_model(),
            base_url: None,
            region: None,
            system_prompt: d_system_prompt(),
            request_timeout_ms: d_request_timeout_ms(),
            max_tool_rounds: d_max_tool_rounds(),
            pricing: HashMap::new(),
        }
    }
}

/// Dollars per 1 million tokens for a specific model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

impl ModelPricing {
    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 * self.input_per_1m + completion_tokens as f64 * self.output_per_1m) / 1_000_000.0
    }
}

fn d_model() -> String {
    "claude-sonnet-4-5".into()
}
fn d_system_prompt() -> String {
    "You are Spaceduck, a helpful local-first personal assistant.".into()
}
fn d_request_timeout_ms() -> u64 {
    60_000
}
fn d_max_tool_rounds() -> u32 {
    8
}

// JSON Pointer paths that trigger a provider rebuild on patch (§4.9).
pub const PROVIDER_REBUILD_PATHS: &[&str] =
    &["/ai/provider", "/ai/model", "/ai/baseUrl", "/ai/region"];
