use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Browser session pool configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserPoolConfig {
    /// Idle eviction timeout. `<= 0` disables idle eviction entirely.
    #[serde(default = "d_idle_timeout_ms")]
    pub session_idle_timeout_ms: i64,
    #[serde(default = "d_max_sessions")]
    pub max_sessions: usize,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            session_idle_timeout_ms: d_idle_timeout_ms(),
            max_sessions: d_max_sessions(),
        }
    }
}

fn d_idle_timeout_ms() -> i64 {
    10 * 60 * 1000
}
fn d_max_sessions() -> usize {
    4
}
