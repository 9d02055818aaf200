//! Memory Extractor (§4.10): runs asynchronously after an `assistant_message`
//! event, asking the provider to pull out durable facts/preferences from the
//! just-completed exchange and writing them as memory records. Never blocks
//! the turn that triggered it — the agent loop emits the event and returns;
//! this runs on its own `tokio::spawn`.

use serde::Deserialize;
use spaceduck_domain::error::Result;
use spaceduck_domain::model::{MemoryKind, MemoryRecord, MemoryScope, MemorySource};
use spaceduck_providers::{ChatRequest, SwappableProvider};
use spaceduck_tools::seams::ConfigStore as ConfigStoreSeam;
use spaceduck_domain::tool::Message;
use std::sync::Arc;
use store_seams::MemoryStore;

pub mod store_seams {
    use async_trait::async_trait;
    use spaceduck_domain::model::MemoryRecord;
    use spaceduck_domain::Result;

    #[async_trait]
    pub trait MemoryStore: Send + Sync {
        async fn insert_record(&self, record: &MemoryRecord) -> Result<()>;
        /// Find the active record this extraction should supersede, if the
        /// new fact overwrites an earlier one on the same subject. A naive
        /// textual match on `title` is enough at this system's scale.
        async fn find_active_by_title(&self, title: &str) -> Result<Option<MemoryRecord>>;
        async fn supersede(&self, old_id: &str, new_record: &MemoryRecord) -> Result<()>;
    }
}

#[derive(Debug, Deserialize)]
struct ExtractedFact {
    kind: String,
    title: String,
    content: String,
    confidence: f32,
}

#[derive(Debug, Deserialize, Default)]
struct ExtractionResult {
    #[serde(default)]
    facts: Vec<ExtractedFact>,
}

const EXTRACTION_PROMPT: &str = r#"Extract any durable facts or preferences about the user from this \
exchange that are worth remembering for future conversations. Respond with \
JSON only: {"facts":[{"kind":"fact|preference|task|other","title":"...","content":"...","confidence":0.0}]}. \
Return {"facts":[]} if nothing is worth remembering."#;

pub struct MemoryExtractor {
    provider: Arc<SwappableProvider>,
}

impl MemoryExtractor {
    pub fn new(provider: Arc<SwappableProvider>) -> Self {
        Self { provider }
    }

    /// Extract and persist facts from one user/assistant exchange. Spawn
    /// this with `tokio::spawn` — it's a no-op failure path (logged, not
    /// propagated) since memory extraction is best-effort by design.
    pub async fn extract(
        &self,
        store: &dyn MemoryStore,
        conversation_id: &str,
        message_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<usize> {
        let request = ChatRequest {
            messages: vec![
                Message::system(EXTRACTION_PROMPT),
                Message::user(format!("User: {user_text}\nAssistant: {assistant_text}")),
            ],
            json_mode: true,
            ..Default::default()
        };
        let response = self.provider.current().chat(&request).await?;
        let parsed: ExtractionResult = serde_json::from_str(response.content.trim())
            .unwrap_or_default();

        let source = MemorySource {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        };

        let mut written = 0;
        for fact in parsed.facts {
            let kind = match fact.kind.as_str() {
                "preference" => MemoryKind::Preference,
                "task" => MemoryKind::Task,
                "fact" => MemoryKind::Fact,
                _ => MemoryKind::Other,
            };
            let record = MemoryRecord::new(
                kind,
                fact.title.clone(),
                fact.content,
                MemoryScope::Conversation { conversation_id: conversation_id.to_string() },
                source.clone(),
                fact.confidence,
            );

            match store.find_active_by_title(&fact.title).await? {
                Some(existing) => {
                    let mut superseding = record;
                    superseding.supersedes = Some(existing.id.clone());
                    store.supersede(&existing.id, &superseding).await?;
                }
                None => store.insert_record(&record).await?,
            }
            written += 1;
        }
        Ok(written)
    }
}

/// Adapts a config-backed secrets/provider question that every extractor
/// caller needs answered before spawning: is an embedding provider active,
/// so recall can use [`spaceduck_domain::model::MemoryScope`]-aware vector
/// search instead of the textual fallback (§4.10).
pub fn embedding_active(config_store: &dyn ConfigStoreSeam) -> bool {
    config_store.get("/embedding/enabled").and_then(|v| v.as_bool()).unwrap_or(false)
}
