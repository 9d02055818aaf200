use serde::{Deserialize, Serialize};

/// Per-message report within a context build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReport {
    pub message_id: String,
    pub raw_chars: usize,
    pub injected_chars: usize,
    pub truncated_per_message: bool,
    pub truncated_total_cap: bool,
    pub included: bool,
}

/// Full report of one context build (§4.6 step 2) — what went into the
/// provider call and what got cut to fit the budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReport {
    pub tail: Vec<MessageReport>,
    pub memory_hint_count: usize,
    pub memory_hint_chars: usize,
    pub total_injected_chars: usize,
}
