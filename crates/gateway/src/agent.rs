//! Agent Loop (C8, §4.6): the per-turn execution shape. Grounded on the
//! teacher's `runtime/turn.rs` (append user message, stream the provider,
//! dispatch any tool calls, re-enter until the provider stops asking for
//! tools) generalized off the teacher's single fixed provider onto the
//! swappable provider proxy and the real tool registry.

use futures_util::StreamExt;
use parking_lot::RwLock as SyncRwLock;
use spaceduck_context::ContextBuilder;
use spaceduck_domain::error::{Error, Result};
use spaceduck_domain::model::{ConversationMessage, MemoryRecord};
use spaceduck_domain::stream::{StreamEvent, Usage};
use spaceduck_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall};
use spaceduck_providers::{ChatRequest, SwappableProvider};
use spaceduck_tools::ToolRegistry;
use std::sync::Arc;
use store_seams::ConversationStore;
use tokio::sync::RwLock as AsyncRwLock;

/// Narrow seam the agent loop needs from persistence — kept separate from
/// `spaceduck_store::{ConversationRepository, MemoryRepository}` so this
/// module doesn't force a concrete storage engine on its callers or tests.
pub mod store_seams {
    use async_trait::async_trait;
    use spaceduck_domain::model::{ConversationMessage, MemoryRecord};
    use spaceduck_domain::Result;

    #[async_trait]
    pub trait ConversationStore: Send + Sync {
        async fn append_message(&self, message: &ConversationMessage) -> Result<()>;
        async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>>;
        async fn recall_hints(&self, conversation_id: &str, query: &str) -> Result<Vec<MemoryRecord>>;
    }
}

/// One step of an in-flight turn, surfaced to the WS dispatcher so it can
/// forward deltas to the client as they arrive (§4.7 `stream.delta`).
pub enum TurnEvent {
    Delta(String),
    ToolCallStarted { call_id: String, tool_name: String },
    ToolResult { call_id: String, is_error: bool },
    /// Emitted once per provider round on `StreamEvent::Done`. The WS
    /// dispatcher has no envelope for it and ignores it; the Task
    /// Scheduler (§4.12) sums it across rounds to enforce a run's
    /// `maxTokens`/`maxCostUsd` budget.
    Usage(Usage),
}

pub struct AgentLoop {
    provider: Arc<SwappableProvider>,
    tools: Arc<AsyncRwLock<Arc<ToolRegistry>>>,
    context_builder: ContextBuilder,
    max_tool_rounds: u32,
    /// Mirrors the in-flight turn's conversation id for tool handlers that
    /// need one outside their call arguments (the browser tools key a
    /// session off it via `ToolBuilderDeps::conversation_id_getter`).
    active_conversation: Arc<SyncRwLock<String>>,
}

impl AgentLoop {
    /// `tools` is the same hot-swappable cell the [`crate::hotswap::HotswapCoordinator`]
    /// rebuilds into — a turn that starts while a rebuild lands sees the new
    /// registry from its next round onward, never a torn mix of old/new tools.
    pub fn new(
        provider: Arc<SwappableProvider>,
        tools: Arc<AsyncRwLock<Arc<ToolRegistry>>>,
        context_builder: ContextBuilder,
        max_tool_rounds: u32,
        active_conversation: Arc<SyncRwLock<String>>,
    ) -> Self {
        Self { provider, tools, context_builder, max_tool_rounds, active_conversation }
    }

    /// Run one full turn: persist the user message, build context, stream
    /// the provider, dispatch tool calls, and persist the final assistant
    /// message. `on_event` is called for every delta/tool event so the
    /// caller (WS dispatcher or a channel adapter) can forward them live;
    /// a provider error mid-stream is returned as `Error::Agent` without
    /// persisting a partial assistant message, matching §4.6's no-retry
    /// failure semantics.
    pub async fn run_turn(
        &self,
        store: &dyn ConversationStore,
        conversation_id: &str,
        system_prompt: &str,
        user_text: &str,
        request_id: Option<String>,
        on_event: impl FnMut(TurnEvent),
    ) -> Result<ConversationMessage> {
        self.run_turn_scoped(store, conversation_id, system_prompt, user_text, request_id, &[], on_event).await
    }

    /// Same as [`Self::run_turn`], restricted to `tool_allow_list` (empty
    /// means unrestricted). The Task Scheduler (§4.12) uses this so a
    /// scheduled task can't reach for tools its definition didn't name.
    pub async fn run_turn_scoped(
        &self,
        store: &dyn ConversationStore,
        conversation_id: &str,
        system_prompt: &str,
        user_text: &str,
        request_id: Option<String>,
        tool_allow_list: &[String],
        mut on_event: impl FnMut(TurnEvent),
    ) -> Result<ConversationMessage> {
        *self.active_conversation.write() = conversation_id.to_string();

        let mut user_msg = ConversationMessage::new(conversation_id, Role::User, user_text);
        user_msg.request_id = request_id.clone();
        store.append_message(&user_msg).await?;

        let history = store.list_messages(conversation_id).await?;
        let hints: Vec<MemoryRecord> = store.recall_hints(conversation_id, user_text).await?;
        let (mut messages, _report) = self.context_builder.build(system_prompt, &hints, &history);
        let tools = self.tools.read().await.clone();

        let mut rounds: u32 = 0;
        loop {
            rounds += 1;
            if rounds > self.max_tool_rounds {
                return Err(Error::Agent(format!(
                    "exceeded max tool rounds ({})",
                    self.max_tool_rounds
                )));
            }

            let request = ChatRequest {
                messages: messages.clone(),
                tools: tools.get_definitions_allowed(tool_allow_list),
                ..Default::default()
            };
            let provider = self.provider.current();
            let mut stream = provider.chat_stream(&request).await?;

            let mut text = String::new();
            let mut pending_calls: Vec<ToolCall> = Vec::new();
            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::Token { text: delta } => {
                        text.push_str(&delta);
                        on_event(TurnEvent::Delta(delta));
                    }
                    StreamEvent::ToolCallFinished { call_id, tool_name, arguments } => {
                        on_event(TurnEvent::ToolCallStarted { call_id: call_id.clone(), tool_name: tool_name.clone() });
                        pending_calls.push(ToolCall { call_id, tool_name, arguments });
                    }
                    StreamEvent::Done { usage, .. } => {
                        if let Some(usage) = usage {
                            on_event(TurnEvent::Usage(usage));
                        }
                        break;
                    }
                    StreamEvent::Error { message } => return Err(Error::Agent(message)),
                    StreamEvent::Thinking { .. } | StreamEvent::ToolCallStarted { .. } | StreamEvent::ToolCallDelta { .. } => {}
                }
            }

            if pending_calls.is_empty() {
                let mut assistant_msg = ConversationMessage::new(conversation_id, Role::Assistant, text);
                assistant_msg.request_id = request_id.clone();
                store.append_message(&assistant_msg).await?;
                return Ok(assistant_msg);
            }

            messages.push(Message {
                role: Role::Assistant,
                content: MessageContent::Parts(
                    pending_calls
                        .iter()
                        .map(|c| ContentPart::ToolUse {
                            id: c.call_id.clone(),
                            name: c.tool_name.clone(),
                            input: c.arguments.clone(),
                        })
                        .collect(),
                ),
            });
            for call in &pending_calls {
                let result = tools.execute_allowed(call, tool_allow_list).await;
                on_event(TurnEvent::ToolResult { call_id: result.call_id.clone(), is_error: result.is_error });
                messages.push(Message {
                    role: Role::Tool,
                    content: MessageContent::Parts(vec![ContentPart::ToolResult {
                        tool_use_id: result.call_id,
                        content: result.content,
                        is_error: result.is_error,
                    }]),
                });
            }
        }
    }
}
