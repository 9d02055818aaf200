use spaceduck_domain::capability::LlmCapabilities;
use spaceduck_domain::error::Result;
use spaceduck_domain::stream::{BoxStream, StreamEvent, Usage};
use spaceduck_domain::tool::{Message, ToolCall, ToolDefinition};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature (0.0 – 2.0). `None` lets the provider choose.
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

/// A provider-agnostic chat completion response (used by `chat`; streaming
/// callers consume [`StreamEvent`]s directly).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// A request for text embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingsRequest {
    pub input: Vec<String>,
    /// Model to use. When `None`, the provider uses its default embedding model.
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsResponse {
    /// One embedding vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Swappable Provider (C4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every chat-completion adapter implements. Adapters translate
/// between our internal types and the wire format of a single vendor's
/// HTTP API (Anthropic, an OpenAI-compatible endpoint, Gemini, Bedrock).
///
/// This is the inner target behind [`crate::swap::SwappableProvider`] — the
/// hot-swap coordinator rebuilds one of these from a new config snapshot and
/// atomically swaps it in, never blocking callers already holding the old one.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// The advertised capabilities of this provider/model combination.
    fn capabilities(&self) -> &LlmCapabilities;

    /// A unique identifier for this provider instance (used in log fields
    /// and error messages, e.g. `"anthropic"`, `"openai_compat"`).
    fn provider_id(&self) -> &str;
}

/// Trait every embedding adapter implements. Rebuilt and swapped
/// independently of the chat provider — `/embedding/provider` need not
/// match `/ai/provider` (§4.9).
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse>;

    fn provider_id(&self) -> &str;

    /// Vector width this provider emits. Used to detect a dimension change
    /// on hot-swap, which forces the persistence layer to rebuild its
    /// vector index (§4.9).
    fn dimensions(&self) -> u32;
}
