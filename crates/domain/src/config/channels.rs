use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// External channel configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One entry per registered external channel (e.g. `"telegram"`,
/// `"discord"`, `"cli"`). Each channel implementation owns its own
/// transport-specific settings beyond `enabled`; the gateway only needs
/// to know whether to start it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(flatten)]
    pub channels: HashMap<String, ChannelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEntry {
    #[serde(default)]
    pub enabled: bool,
    /// Transport-specific settings, opaque to the gateway core.
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl Default for ChannelEntry {
    fn default() -> Self {
        Self {
            enabled: false,
            settings: serde_json::Value::Null,
        }
    }
}

/// JSON Pointer glob matched against every configured channel's `enabled`
/// flag — any channel toggle triggers the stop-then-start rebuild of
/// §4.9.
pub const CHANNEL_REBUILD_GLOB: &str = "/channels/*/enabled";
