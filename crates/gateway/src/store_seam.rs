//! Shared [`crate::agent::store_seams::ConversationStore`] implementation,
//! backed by the real `spaceduck-store` repositories. The WS dispatcher,
//! HTTP routes that trigger a turn, and (eventually) external channel
//! adapters all construct an `AgentLoop` against this same seam, so memory
//! recall (§4.10) is wired once instead of re-stubbed per caller.

use std::sync::Arc;

use spaceduck_domain::model::{ConversationMessage, MemoryRecord};
use spaceduck_domain::Result;
use spaceduck_providers::{EmbeddingsRequest, SwappableEmbeddingProvider};
use spaceduck_store::{ConversationRepository, MemoryRepository, SqliteStore};

const RECALL_LIMIT: usize = 5;
const TITLE_LOOKUP_LIMIT: usize = 20;

pub struct GatewayConversationStore {
    store: Arc<SqliteStore>,
    embedding: Arc<SwappableEmbeddingProvider>,
}

impl GatewayConversationStore {
    pub fn new(store: Arc<SqliteStore>, embedding: Arc<SwappableEmbeddingProvider>) -> Self {
        Self { store, embedding }
    }
}

#[async_trait::async_trait]
impl crate::agent::store_seams::ConversationStore for GatewayConversationStore {
    async fn append_message(&self, message: &ConversationMessage) -> Result<()> {
        ConversationRepository::append_message(self.store.as_ref(), message).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        ConversationRepository::list_messages(self.store.as_ref(), conversation_id).await
    }

    /// Vector recall when an embedding provider is active, textual
    /// substring recall otherwise (§4.10: "falls back to textual matching
    /// when no embedding provider is configured").
    async fn recall_hints(&self, _conversation_id: &str, query: &str) -> Result<Vec<MemoryRecord>> {
        if let Some(embedder) = self.embedding.current() {
            let request = EmbeddingsRequest { input: vec![query.to_string()], model: None };
            if let Ok(response) = embedder.embed(request).await {
                if let Some(vector) = response.embeddings.into_iter().next() {
                    return MemoryRepository::recall_vector(self.store.as_ref(), &vector, RECALL_LIMIT).await;
                }
            }
        }
        MemoryRepository::recall_textual(self.store.as_ref(), query, RECALL_LIMIT).await
    }
}

/// Shared [`crate::memory_extractor::store_seams::MemoryStore`]
/// implementation. Stamps an embedding onto a record before it's
/// persisted whenever an embedding provider is active, so later recall
/// (`GatewayConversationStore::recall_hints`) can do vector search over
/// facts extracted from earlier turns, not just the ones just written.
pub struct GatewayMemoryStore {
    store: Arc<SqliteStore>,
    embedding: Arc<SwappableEmbeddingProvider>,
}

impl GatewayMemoryStore {
    pub fn new(store: Arc<SqliteStore>, embedding: Arc<SwappableEmbeddingProvider>) -> Self {
        Self { store, embedding }
    }

    async fn embed_record(&self, record: &MemoryRecord) -> Option<Vec<f32>> {
        let embedder = self.embedding.current()?;
        let request = EmbeddingsRequest { input: vec![format!("{}: {}", record.title, record.content)], model: None };
        embedder.embed(request).await.ok()?.embeddings.into_iter().next()
    }
}

#[async_trait::async_trait]
impl crate::memory_extractor::store_seams::MemoryStore for GatewayMemoryStore {
    async fn insert_record(&self, record: &MemoryRecord) -> Result<()> {
        let mut record = record.clone();
        record.embedding = self.embed_record(&record).await;
        MemoryRepository::insert_record(self.store.as_ref(), &record).await
    }

    async fn find_active_by_title(&self, title: &str) -> Result<Option<MemoryRecord>> {
        let candidates = MemoryRepository::recall_textual(self.store.as_ref(), title, TITLE_LOOKUP_LIMIT).await?;
        Ok(candidates.into_iter().find(|r| r.title == title))
    }

    async fn supersede(&self, old_id: &str, new_record: &MemoryRecord) -> Result<()> {
        let mut new_record = new_record.clone();
        new_record.embedding = self.embed_record(&new_record).await;
        MemoryRepository::supersede(self.store.as_ref(), old_id, &new_record).await
    }
}
