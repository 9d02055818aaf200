//! Swappable Provider / Swappable Embedding Provider (C4, §4.9).
//!
//! A thin proxy whose inner target can be atomically replaced. The hot-swap
//! coordinator builds a new adapter from a validated config snapshot off to
//! the side; on success it calls `swap()`, which publishes the new `Arc`
//! under the lock. Callers already holding a clone of the old `Arc` (e.g. an
//! in-flight `chat_stream`) keep running against it until they drop it —
//! there is no forced cancellation on swap.

use crate::traits::{EmbeddingProvider, LlmProvider};
use parking_lot::RwLock;
use std::sync::Arc;

pub struct SwappableProvider {
    inner: RwLock<Arc<dyn LlmProvider>>,
}

impl SwappableProvider {
    pub fn new(initial: Arc<dyn LlmProvider>) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    /// A stable snapshot of the current target. Cheap `Arc` clone under a
    /// brief read lock.
    pub fn current(&self) -> Arc<dyn LlmProvider> {
        self.inner.read().clone()
    }

    /// Atomically replace the target. The previous `Arc` is dropped once
    /// every existing clone (including ones in flight) is dropped.
    pub fn swap(&self, new: Arc<dyn LlmProvider>) {
        *self.inner.write() = new;
    }
}

pub struct SwappableEmbeddingProvider {
    inner: RwLock<Option<Arc<dyn EmbeddingProvider>>>,
}

impl SwappableEmbeddingProvider {
    pub fn new(initial: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    /// `None` when `/embedding/enabled` is false — callers fall back to
    /// textual memory recall (§4.10).
    pub fn current(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        self.inner.read().clone()
    }

    pub fn swap(&self, new: Option<Arc<dyn EmbeddingProvider>>) {
        *self.inner.write() = new;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse};
    use spaceduck_domain::capability::LlmCapabilities;
    use spaceduck_domain::error::Result;
    use spaceduck_domain::stream::{BoxStream, StreamEvent};

    struct StubProvider {
        id: &'static str,
        caps: LlmCapabilities,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: self.id.to_string(),
                tool_calls: vec![],
                usage: None,
                model: self.id.to_string(),
                finish_reason: Some("stop".into()),
            })
        }
        async fn chat_stream(
            &self,
            _req: &ChatRequest,
        ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            unimplemented!("not exercised in this test")
        }
        fn capabilities(&self) -> &LlmCapabilities {
            &self.caps
        }
        fn provider_id(&self) -> &str {
            self.id
        }
    }

    struct StubEmbedder {
        id: &'static str,
        dims: u32,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
            Ok(EmbeddingsResponse {
                embeddings: req.input.iter().map(|_| vec![0.0; self.dims as usize]).collect(),
            })
        }
        fn provider_id(&self) -> &str {
            self.id
        }
        fn dimensions(&self) -> u32 {
            self.dims
        }
    }

    #[tokio::test]
    async fn swap_replaces_target_for_new_callers() {
        let proxy = SwappableProvider::new(Arc::new(StubProvider {
            id: "a",
            caps: LlmCapabilities::default(),
        }));
        assert_eq!(proxy.current().provider_id(), "a");

        proxy.swap(Arc::new(StubProvider {
            id: "b",
            caps: LlmCapabilities::default(),
        }));
        assert_eq!(proxy.current().provider_id(), "b");
    }

    #[tokio::test]
    async fn in_flight_holder_keeps_old_target_after_swap() {
        let proxy = SwappableProvider::new(Arc::new(StubProvider {
            id: "old",
            caps: LlmCapabilities::default(),
        }));
        let held = proxy.current();

        proxy.swap(Arc::new(StubProvider {
            id: "new",
            caps: LlmCapabilities::default(),
        }));

        assert_eq!(held.provider_id(), "old");
        assert_eq!(proxy.current().provider_id(), "new");
    }

    #[tokio::test]
    async fn embedding_proxy_can_be_disabled() {
        let proxy = SwappableEmbeddingProvider::new(None);
        assert!(proxy.current().is_none());

        proxy.swap(Some(Arc::new(StubEmbedder { id: "openai_compat", dims: 1536 })));
        assert_eq!(proxy.current().unwrap().dimensions(), 1536);

        proxy.swap(None);
        assert!(proxy.current().is_none());
    }
}
