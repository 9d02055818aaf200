//! WebSocket Dispatcher (C9, §4.7): chat envelope protocol over the
//! axum `WebSocketUpgrade` → split sink/stream → reader-loop/writer-task
//! pattern grounded on the teacher's `nodes/ws.rs`, re-purposed from the
//! node tool-call protocol to spec §4.7's `{v:1,type,...}` chat envelopes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message as WsFrame, WebSocket};
use axum::extract::{FromRequestParts, Query, State, WebSocketUpgrade};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spaceduck_domain::model::{Conversation, ConversationMessage};
use spaceduck_providers::SwappableEmbeddingProvider;
use spaceduck_store::{ConversationRepository, SqliteStore};
use tokio::sync::mpsc;

use crate::agent::{AgentLoop, TurnEvent};
use crate::memory_extractor::MemoryExtractor;
use crate::run_lock::RunLock;
use crate::store_seam::{GatewayConversationStore, GatewayMemoryStore};

/// One connection's identity, resolved from the `?token=` query param
/// against the paired-device token store. Every WS client is the native
/// companion app, so `channel_id` is always `"ws"` — external adapters
/// (§4.11) speak their own protocol and call into the agent loop directly
/// rather than through this dispatcher.
#[derive(Clone)]
pub struct ConnectionIdentity {
    pub sender_id: String,
    pub channel_id: String,
}

#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, raw_token: &str) -> Option<String>;
}

pub struct WsDeps {
    pub store: Arc<SqliteStore>,
    pub embedding: Arc<SwappableEmbeddingProvider>,
    pub agent: Arc<AgentLoop>,
    pub run_lock: Arc<RunLock>,
    pub memory_extractor: Arc<MemoryExtractor>,
    pub system_prompt: String,
    pub tokens: Arc<dyn TokenVerifier>,
}

#[derive(Debug, Deserialize)]
struct WsAuthQuery {
    token: Option<String>,
}

impl FromRequestParts<Arc<WsDeps>> for ConnectionIdentity {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<WsDeps>) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<WsAuthQuery>::from_request_parts(parts, state)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        let raw = query.token.unwrap_or_default();
        match state.tokens.verify(&raw).await {
            Some(token_id) => Ok(ConnectionIdentity { sender_id: token_id, channel_id: "ws".into() }),
            None => Err(StatusCode::UNAUTHORIZED),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientEnvelope {
    #[serde(rename = "message.send")]
    MessageSend { request_id: String, content: String, conversation_id: Option<String> },
    #[serde(rename = "conversation.list")]
    ConversationList,
    #[serde(rename = "conversation.history")]
    ConversationHistory { conversation_id: String },
    #[serde(rename = "conversation.create")]
    ConversationCreate { #[serde(default)] title: Option<String> },
    #[serde(rename = "conversation.delete")]
    ConversationDelete { conversation_id: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerEnvelope {
    #[serde(rename = "message.accepted")]
    MessageAccepted { request_id: String },
    #[serde(rename = "processing.started")]
    ProcessingStarted { request_id: String },
    #[serde(rename = "stream.delta")]
    StreamDelta { request_id: String, delta: String },
    #[serde(rename = "tool.calling")]
    ToolCalling { request_id: String, call_id: String, tool_name: String },
    #[serde(rename = "tool.result")]
    ToolResult { request_id: String, call_id: String, is_error: bool },
    #[serde(rename = "stream.done")]
    StreamDone { request_id: String, message_id: String },
    #[serde(rename = "stream.error")]
    StreamError { request_id: String, code: String, message: String },
    #[serde(rename = "conversation.list")]
    ConversationListResult { conversations: Vec<Conversation> },
    #[serde(rename = "conversation.history")]
    ConversationHistoryResult { conversation_id: String, messages: Vec<ConversationMessage> },
    #[serde(rename = "conversation.created")]
    ConversationCreated { conversation_id: String },
    #[serde(rename = "conversation.deleted")]
    ConversationDeleted { conversation_id: String },
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

fn envelope(inner: ServerEnvelope) -> Value {
    let mut v = serde_json::to_value(&inner).unwrap_or(Value::Null);
    if let Value::Object(ref mut map) = v {
        map.insert("v".into(), Value::from(1));
    }
    v
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(deps): State<Arc<WsDeps>>,
    identity: ConnectionIdentity,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, deps, identity))
}

/// Monotonic per-connection holder id for the run lock — lets a single
/// connection issue overlapping `message.send` for *different*
/// conversations without tripping the reentrant-acquire guard meant for
/// one holder racing itself on the same conversation.
static NEXT_HOLDER: AtomicU64 = AtomicU64::new(1);

async fn handle_socket(socket: WebSocket, deps: Arc<WsDeps>, identity: ConnectionIdentity) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Value>(64);

    let writer = tokio::spawn(async move {
        while let Some(value) = outbound_rx.recv().await {
            let Ok(text) = serde_json::to_string(&value) else { continue };
            if sink.send(WsFrame::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let holder = NEXT_HOLDER.fetch_add(1, Ordering::Relaxed);
    tracing::info!(sender = %identity.sender_id, channel = %identity.channel_id, "ws connected");

    while let Some(frame) = stream.next().await {
        let Ok(frame) = frame else { break };
        match frame {
            WsFrame::Text(text) => {
                handle_envelope(&text, &deps, &identity, holder, &outbound_tx).await;
            }
            WsFrame::Close(_) => break,
            _ => {}
        }
    }

    // §4.7: closing the socket cancels nothing — any agent run spawned
    // above keeps running and persisting against `deps.store` on its own
    // task; only the outbound channel (and thus the writer) goes away.
    writer.abort();
    tracing::info!(sender = %identity.sender_id, "ws disconnected");
}

async fn handle_envelope(
    text: &str,
    deps: &Arc<WsDeps>,
    identity: &ConnectionIdentity,
    holder: u64,
    out: &mpsc::Sender<Value>,
) {
    let raw: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            let _ = out.send(envelope(ServerEnvelope::Error {
                code: "INVALID_JSON".into(),
                message: "frame is not valid JSON".into(),
            })).await;
            return;
        }
    };
    if !raw.is_object() {
        let _ = out.send(envelope(ServerEnvelope::Error {
            code: "INVALID_ENVELOPE".into(),
            message: "envelope must be a JSON object".into(),
        })).await;
        return;
    }
    if let Some(v) = raw.get("v") {
        if v != 1 {
            let _ = out.send(envelope(ServerEnvelope::Error {
                code: "UNSUPPORTED_VERSION".into(),
                message: "only envelope version 1 is supported".into(),
            })).await;
            return;
        }
    }

    let parsed: Result<ClientEnvelope, _> = serde_json::from_value(raw);
    let msg = match parsed {
        Ok(m) => m,
        Err(_) => {
            let _ = out.send(envelope(ServerEnvelope::Error {
                code: "UNKNOWN_TYPE".into(),
                message: "unrecognized or malformed envelope type".into(),
            })).await;
            return;
        }
    };

    match msg {
        ClientEnvelope::MessageSend { request_id, content, conversation_id } => {
            handle_message_send(deps, identity, holder, request_id, content, conversation_id, out).await;
        }
        ClientEnvelope::ConversationList => {
            match deps.store.list_conversations().await {
                Ok(conversations) => {
                    let _ = out.send(envelope(ServerEnvelope::ConversationListResult { conversations })).await;
                }
                Err(e) => {
                    let _ = out.send(envelope(ServerEnvelope::Error { code: e.code().into(), message: e.to_string() })).await;
                }
            }
        }
        ClientEnvelope::ConversationHistory { conversation_id } => {
            match deps.store.list_messages(&conversation_id).await {
                Ok(messages) => {
                    let _ = out.send(envelope(ServerEnvelope::ConversationHistoryResult { conversation_id, messages })).await;
                }
                Err(e) => {
                    let _ = out.send(envelope(ServerEnvelope::Error { code: e.code().into(), message: e.to_string() })).await;
                }
            }
        }
        ClientEnvelope::ConversationCreate { title } => {
            match deps.store.create_conversation(title).await {
                Ok(conv) => {
                    let _ = out.send(envelope(ServerEnvelope::ConversationCreated { conversation_id: conv.id })).await;
                }
                Err(e) => {
                    let _ = out.send(envelope(ServerEnvelope::Error { code: e.code().into(), message: e.to_string() })).await;
                }
            }
        }
        ClientEnvelope::ConversationDelete { conversation_id } => {
            match deps.store.delete_conversation(&conversation_id).await {
                Ok(()) => {
                    let _ = out.send(envelope(ServerEnvelope::ConversationDeleted { conversation_id })).await;
                }
                Err(e) => {
                    let _ = out.send(envelope(ServerEnvelope::Error { code: e.code().into(), message: e.to_string() })).await;
                }
            }
        }
    }
}

/// §4.7 ordering law: `message.accepted` is emitted synchronously before
/// the run lock is even requested, so it always precedes
/// `processing.started`, which in turn is only emitted once the lock is
/// held — i.e. after any queued-ahead run for the same conversation has
/// finished.
async fn handle_message_send(
    deps: &Arc<WsDeps>,
    identity: &ConnectionIdentity,
    holder: u64,
    request_id: String,
    content: String,
    conversation_id: Option<String>,
    out: &mpsc::Sender<Value>,
) {
    let _ = out.send(envelope(ServerEnvelope::MessageAccepted { request_id: request_id.clone() })).await;

    let conversation_id = match conversation_id {
        Some(id) => id,
        None => match deps.store.get_session(&identity.channel_id, &identity.sender_id).await {
            Ok(Some(session)) => session.conversation_id,
            _ => match deps.store.create_conversation(None).await {
                Ok(conv) => conv.id,
                Err(e) => {
                    let _ = out.send(envelope(ServerEnvelope::StreamError {
                        request_id,
                        code: e.code().into(),
                        message: e.to_string(),
                    })).await;
                    return;
                }
            },
        },
    };

    let guard = match deps.run_lock.acquire(&conversation_id, holder).await {
        Ok(g) => g,
        Err(e) => {
            let _ = out.send(envelope(ServerEnvelope::StreamError {
                request_id,
                code: e.code().into(),
                message: e.to_string(),
            })).await;
            return;
        }
    };

    let _ = out.send(envelope(ServerEnvelope::ProcessingStarted { request_id: request_id.clone() })).await;

    let store_seam = GatewayConversationStore::new(deps.store.clone(), deps.embedding.clone());
    let req_id_for_events = request_id.clone();
    let out_events = out.clone();
    let result = deps
        .agent
        .run_turn(
            &store_seam,
            &conversation_id,
            &deps.system_prompt,
            &content,
            Some(request_id.clone()),
            move |event| {
                // `TurnEvent::Usage` has no WS envelope (§4.7's table doesn't
                // carry token usage to the client) — only the Task Scheduler
                // consumes it, via its own `on_event` closure.
                let envelope_value = match event {
                    TurnEvent::Delta(delta) => {
                        Some(envelope(ServerEnvelope::StreamDelta { request_id: req_id_for_events.clone(), delta }))
                    }
                    TurnEvent::ToolCallStarted { call_id, tool_name } => {
                        Some(envelope(ServerEnvelope::ToolCalling { request_id: req_id_for_events.clone(), call_id, tool_name }))
                    }
                    TurnEvent::ToolResult { call_id, is_error } => {
                        Some(envelope(ServerEnvelope::ToolResult { request_id: req_id_for_events.clone(), call_id, is_error }))
                    }
                    TurnEvent::Usage(_) => None,
                };
                if let Some(envelope_value) = envelope_value {
                    let _ = out_events.try_send(envelope_value);
                }
            },
        )
        .await;
    guard.release();

    match result {
        Ok(assistant_msg) => {
            let _ = out.send(envelope(ServerEnvelope::StreamDone { request_id, message_id: assistant_msg.id.clone() })).await;
            spawn_memory_extraction(deps, conversation_id, assistant_msg.id.clone(), content, assistant_msg.text.clone());
        }
        Err(e) => {
            let _ = out.send(envelope(ServerEnvelope::StreamError { request_id, code: e.code().into(), message: e.to_string() })).await;
        }
    }
}

/// §4.10: runs off to the side after the turn's `stream.done` has already
/// gone out — a slow or failing extraction never delays the reply the
/// client is waiting on.
fn spawn_memory_extraction(
    deps: &Arc<WsDeps>,
    conversation_id: String,
    message_id: String,
    user_text: String,
    assistant_text: String,
) {
    let extractor = deps.memory_extractor.clone();
    let memory_store = GatewayMemoryStore::new(deps.store.clone(), deps.embedding.clone());
    tokio::spawn(async move {
        if let Err(e) = extractor
            .extract(&memory_store, &conversation_id, &message_id, &user_text, &assistant_text)
            .await
        {
            tracing::warn!(error = %e, conversation_id, "memory extraction failed");
        }
    });
}

