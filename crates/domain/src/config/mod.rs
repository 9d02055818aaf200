mod ai;
mod browser;
mod channels;
mod embedding;
mod patch;
mod scheduler;
mod secrets;
mod server;
mod stt;
mod tools;

pub use ai::*;
pub use browser::*;
pub use channels::*;
pub use embedding::*;
pub use patch::*;
pub use scheduler::*;
pub use secrets::*;
pub use server::*;
pub use stt::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config — the document stored at
// `${SPACEDUCK_CONFIG_DIR}/spaceduck.config.json5`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub browser: BrowserPoolConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token. If unset, admin
    /// endpoints are disabled (403).
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "SPACEDUCK_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rebuild-path matching (§4.9)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which collaborators a patched path forces the hot-swap coordinator to
/// rebuild. A single patch batch may touch several — the coordinator
/// dedupes and rebuilds each affected collaborator once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebuildTarget {
    Provider,
    EmbeddingProvider,
    ToolRegistry,
    Channels,
    SttBackend,
    BrowserPool,
}

/// Determine which collaborators a single patched path touches. Channel
/// paths are glob-matched (`/channels/<id>/enabled`); everything else is an
/// exact match against the per-component rebuild tables.
pub fn rebuild_targets_for_path(path: &str) -> Vec<RebuildTarget> {
    let mut targets = Vec::new();
    if PROVIDER_REBUILD_PATHS.contains(&path) {
        targets.push(RebuildTarget::Provider);
    }
    if EMBEDDING_REBUILD_PATHS.contains(&path) {
        targets.push(RebuildTarget::EmbeddingProvider);
    }
    if TOOL_REBUILD_PATHS.contains(&path) || TOOL_SECRET_PATHS.contains(&path) {
        targets.push(RebuildTarget::ToolRegistry);
    }
    if STT_REBUILD_PATHS.contains(&path) {
        targets.push(RebuildTarget::SttBackend);
    }
    if path.starts_with("/channels/") && path.ends_with("/enabled") {
        targets.push(RebuildTarget::Channels);
    }
    if path.starts_with("/browser/") {
        targets.push(RebuildTarget::BrowserPool);
    }
    targets
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good; any `Error`-severity issue should
    /// block `load()`/`patch()` from committing.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if !self.server.auth_required {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.authRequired".into(),
                message: "auth is disabled — only appropriate for local development".into(),
            });
        }

        if let Some(base_url) = &self.ai.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "ai.baseUrl".into(),
                    message: format!(
                        "baseUrl must start with http:// or https:// (got \"{base_url}\")"
                    ),
                });
            }
        }
        if self.ai.model.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "ai.model".into(),
                message: "model must not be empty".into(),
            });
        }

        if self.embedding.enabled {
            if let Some(base_url) = &self.embedding.base_url {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "embedding.baseUrl".into(),
                        message: format!(
                            "baseUrl must start with http:// or https:// (got \"{base_url}\")"
                        ),
                    });
                }
            }
            if self.embedding.dimensions == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "embedding.dimensions".into(),
                    message: "dimensions must be greater than 0".into(),
                });
            }
        }

        if self.tools.web_search.enabled && self.tools.web_search.provider == WebSearchProvider::None
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "tools.webSearch.provider".into(),
                message: "webSearch is enabled but no provider is configured".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowedOrigins".into(),
                message: "wildcard \"*\" allows all origins".into(),
            });
        }

        if let Some(daily) = self.scheduler.budget.daily_limit_usd {
            if daily <= 0.0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "scheduler.budget.dailyLimitUsd".into(),
                    message: "dailyLimitUsd must be greater than 0 when set".into(),
                });
            }
        }
        if let Some(monthly) = self.scheduler.budget.monthly_limit_usd {
            if monthly <= 0.0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "scheduler.budget.monthlyLimitUsd".into(),
                    message: "monthlyLimitUsd must be greater than 0 when set".into(),
                });
            }
        }
        if self.scheduler.max_concurrent_tasks == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "scheduler.maxConcurrentTasks".into(),
                message: "maxConcurrentTasks must be greater than 0".into(),
            });
        }

        if self.browser.max_sessions == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "browser.maxSessions".into(),
                message: "maxSessions must be greater than 0".into(),
            });
        }

        if matches!(self.stt.backend, SttBackend::AwsTranscribe) && self.stt.aws_transcribe.region.is_none()
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "stt.awsTranscribe.region".into(),
                message: "awsTranscribe backend requires a region".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.port").expect("expected server.port error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn auth_disabled_is_warning() {
        let mut cfg = Config::default();
        cfg.server.auth_required = false;
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "server.authRequired").expect("expected authRequired warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn ai_base_url_invalid_scheme_is_error() {
        let mut cfg = Config::default();
        cfg.ai.base_url = Some("ftp://localhost".into());
        let issues = cfg.validate();
        let issue = find_issue(&issues, "ai.baseUrl").expect("expected ai.baseUrl error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn embedding_disabled_skips_url_check() {
        let mut cfg = Config::default();
        cfg.embedding.enabled = false;
        cfg.embedding.base_url = Some("not-a-url".into());
        let issues = cfg.validate();
        assert!(find_issue(&issues, "embedding.baseUrl").is_none());
    }

    #[test]
    fn embedding_enabled_bad_url_is_error() {
        let mut cfg = Config::default();
        cfg.embedding.enabled = true;
        cfg.embedding.base_url = Some("not-a-url".into());
        let issues = cfg.validate();
        assert!(find_issue(&issues, "embedding.baseUrl").is_some());
    }

    #[test]
    fn web_search_enabled_no_provider_is_warning() {
        let mut cfg = Config::default();
        cfg.tools.web_search.enabled = true;
        cfg.tools.web_search.provider = WebSearchProvider::None;
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "tools.webSearch.provider").expect("expected provider warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let cfg = Config::default();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.cors.allowedOrigins")
            .expect("default cors is wildcard, expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn negative_budget_is_error() {
        let mut cfg = Config::default();
        cfg.scheduler.budget.daily_limit_usd = Some(-1.0);
        let issues = cfg.validate();
        assert!(find_issue(&issues, "scheduler.budget.dailyLimitUsd").is_some());
    }

    #[test]
    fn aws_transcribe_without_region_is_error() {
        let mut cfg = Config::default();
        cfg.stt.backend = SttBackend::AwsTranscribe;
        cfg.stt.aws_transcribe.region = None;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "stt.awsTranscribe.region").is_some());
    }

    #[test]
    fn rebuild_targets_match_ai_model_path() {
        let targets = rebuild_targets_for_path("/ai/model");
        assert!(targets.contains(&RebuildTarget::Provider));
    }

    #[test]
    fn rebuild_targets_match_channel_glob() {
        let targets = rebuild_targets_for_path("/channels/telegram/enabled");
        assert!(targets.contains(&RebuildTarget::Channels));
    }

    #[test]
    fn rebuild_targets_empty_for_unrelated_path() {
        let targets = rebuild_targets_for_path("/ai/systemPrompt");
        assert!(targets.is_empty());
    }

    #[test]
    fn serde_roundtrip_is_camel_case() {
        let cfg = Config::default();
        let value = serde_json::to_value(&cfg).unwrap();
        assert!(value.get("ai").unwrap().get("baseUrl").is_some());
        assert!(value.get("server").unwrap().get("authRequired").is_some());
    }
}
