//! The persisted data model (§3): conversations, messages, sessions, memory
//! records, attachments, auth tokens, pairing sessions, and task records.
//! These are plain structs — the storage adapter in `spaceduck-store` owns
//! the SQL shape; this crate only owns the in-memory representation and
//! wire format.

use crate::tool::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversations & messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: Option<String>,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One append-only entry in a conversation's message log. Distinct from
/// [`crate::tool::Message`], which is the provider-facing shape built
/// fresh for each turn from a slice of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Correlates this message with the `requestId` of the turn that
    /// produced it (absent for messages with no originating WS request,
    /// e.g. scheduled-task output).
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl ConversationMessage {
    pub fn new(conversation_id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role,
            text: text.into(),
            created_at: Utc::now(),
            request_id: None,
            attachments: Vec::new(),
        }
    }
}

/// The only view of an attachment visible outside the trust boundary: an
/// opaque id plus display metadata. Never a filesystem path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub id: String,
    pub filename: String,
    pub mime: String,
    pub size: u64,
}

/// The full record backing an [`AttachmentRef`], held only by the
/// attachment store. `local_path` never crosses a trust boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentEntry {
    pub id: String,
    pub local_path: String,
    pub filename: String,
    pub mime: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl AttachmentEntry {
    pub fn as_ref(&self) -> AttachmentRef {
        AttachmentRef {
            id: self.id.clone(),
            filename: self.filename.clone(),
            mime: self.mime.clone(),
            size: self.size,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Maps `(channel, sender)` to the conversation currently active for that
/// pair. Created lazily on first message from a new sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub channel: String,
    pub sender: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn key(channel: &str, sender: &str) -> String {
        format!("{channel}:{sender}")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Fact,
    Preference,
    Task,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    Active,
    Superseded,
}

/// Where a memory record is visible from. `Global` recalls in every
/// conversation; the scoped variants are visible only within the named
/// conversation or from the same sender across conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryScope {
    Global,
    Conversation { conversation_id: String },
    Sender { sender: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySource {
    pub conversation_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,
    pub kind: MemoryKind,
    pub title: String,
    pub content: String,
    pub scope: MemoryScope,
    pub source: MemorySource,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f32,
    pub status: MemoryStatus,
    /// Present only once an embedding provider is active.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    /// Set when this record superseded an earlier one, or was itself
    /// superseded —`None` while `status == Active` and unrelated to any
    /// prior record.
    #[serde(default)]
    pub supersedes: Option<String>,
}

impl MemoryRecord {
    pub fn new(
        kind: MemoryKind,
        title: impl Into<String>,
        content: impl Into<String>,
        scope: MemoryScope,
        source: MemorySource,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            content: content.into(),
            scope,
            source,
            confidence: confidence.clamp(0.0, 1.0),
            status: MemoryStatus::Active,
            embedding: None,
            created_at: Utc::now(),
            supersedes: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySettings {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A hashed bearer token. The plaintext exists only at issue time, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub id: String,
    #[serde(skip_serializing)]
    pub token_hash: Vec<u8>,
    pub device_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingSession {
    pub id: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
}

impl PairingSession {
    pub const TTL_SECONDS: i64 = 10 * 60;
    pub const MAX_ATTEMPTS: u32 = 5;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_rate_limited(&self) -> bool {
        self.attempts >= Self::MAX_ATTEMPTS
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSchedule {
    Interval { every_ms: u64 },
    Cron { expr: String },
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    DeadLetter,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBudget {
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub max_cost_usd: Option<f64>,
    #[serde(default)]
    pub max_wall_clock_ms: Option<u64>,
    #[serde(default)]
    pub max_tool_calls: Option<u32>,
    #[serde(default)]
    pub max_memory_writes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub prompt: String,
    /// Restrict the agent loop to this subset of registered tool names.
    /// Empty means no restriction.
    #[serde(default)]
    pub tool_allow_list: Vec<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub definition: TaskDefinition,
    pub schedule: TaskSchedule,
    pub budget: TaskBudget,
    pub status: TaskStatus,
    pub next_run_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    pub id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub ok: bool,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub tool_calls_used: u32,
    pub memory_writes_used: u32,
    #[serde(default)]
    pub error: Option<String>,
}

// Run-lock entries are transient, in-memory-only state owned by the Run
// Lock component (`conversationId -> pending release`) — there is no
// persisted representation, so no type for them lives here.
