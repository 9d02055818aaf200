use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task scheduler configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// How often the scheduler polls for due tasks.
    #[serde(default = "d_heartbeat_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_tasks: u32,
    #[serde(default = "d_max_attempts")]
    pub default_max_attempts: u32,
    #[serde(default = "d_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "d_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default)]
    pub budget: BudgetConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: d_heartbeat_ms(),
            max_concurrent_tasks: d_max_concurrent(),
            default_max_attempts: d_max_attempts(),
            backoff_base_ms: d_backoff_base_ms(),
            backoff_max_ms: d_backoff_max_ms(),
            budget: BudgetConfig::default(),
        }
    }
}

/// Global daily/monthly spend guard (§4.12 step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    #[serde(default)]
    pub daily_limit_usd: Option<f64>,
    #[serde(default)]
    pub monthly_limit_usd: Option<f64>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit_usd: None,
            monthly_limit_usd: None,
        }
    }
}

fn d_heartbeat_ms() -> u64 {
    5_000
}
fn d_max_concurrent() -> u32 {
    4
}
fn d_max_attempts() -> u32 {
    3
}
fn d_backoff_base_ms() -> u64 {
    30_000
}
fn d_backoff_max_ms() -> u64 {
    60 * 60 * 1000
}
