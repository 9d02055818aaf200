//! Browser session pool (C7, spec §4.5).
//!
//! Maps `conversationId -> headless browser session`. Each conversation that
//! uses a browser tool gets its own [`chromiumoxide`] instance, kept warm
//! across tool calls within a turn and evicted after an idle timeout or when
//! the pool hits its session cap.
//!
//! Mirrors the process-session registry shape used for background shell
//! processes elsewhere in the workspace: a `RwLock<HashMap<String, Arc<...>>>`
//! with each entry separately lockable for its own mutable state.

mod session;

pub use session::BrowserSession;

use chromiumoxide::Browser;
use chromiumoxide::browser::BrowserConfig;
use futures_util::StreamExt;
use parking_lot::RwLock;
use spaceduck_domain::config::BrowserPoolConfig;
use spaceduck_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;

/// Hook invoked after a new session is launched for a conversation, before
/// [`BrowserSessionPool::acquire`] returns it. Used by the gateway to wire up
/// live-preview streaming (`tools.browser.livePreview`).
pub type OnNewSession = Box<dyn Fn(&str, &Arc<BrowserSession>) + Send + Sync>;

pub struct BrowserSessionPool {
    sessions: RwLock<HashMap<String, Arc<BrowserSession>>>,
    config: RwLock<BrowserPoolConfig>,
    on_new_session: Option<OnNewSession>,
}

impl BrowserSessionPool {
    pub fn new(config: BrowserPoolConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config: RwLock::new(config),
            on_new_session: None,
        }
    }

    pub fn with_on_new_session(mut self, hook: OnNewSession) -> Self {
        self.on_new_session = Some(hook);
        self
    }

    /// Re-read the live pool config (idle timeout / max sessions can change
    /// via the config store between acquisitions).
    pub fn set_config(&self, config: BrowserPoolConfig) {
        *self.config.write() = config;
    }

    fn config_snapshot(&self) -> BrowserPoolConfig {
        self.config.read().clone()
    }

    /// Return the existing session for `conversation_id`, or launch a new
    /// one. Evicts the least-recently-used session first if the pool is at
    /// `maxSessions` capacity.
    pub async fn acquire(self: &Arc<Self>, conversation_id: &str) -> Result<Arc<BrowserSession>> {
        let config = self.config_snapshot();

        if let Some(existing) = self.sessions.read().get(conversation_id).cloned() {
            existing.touch();
            self.rearm_idle_timer(conversation_id.to_string(), &existing, config.session_idle_timeout_ms);
            return Ok(existing);
        }

        self.evict_lru_if_at_capacity(config.max_sessions).await;

        tracing::info!(conversation_id, "launching browser session");
        let browser_config = BrowserConfig::builder()
            .build()
            .map_err(|e| Error::Internal(format!("browser config: {e}")))?;
        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::Internal(format!("browser launch: {e}")))?;

        // chromiumoxide requires the handler event stream to be polled
        // continuously for the duration of the browser's life.
        let handler_task: JoinHandle<()> = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Internal(format!("new page: {e}")))?;

        let session = Arc::new(BrowserSession::new(
            conversation_id.to_string(),
            browser,
            page,
            handler_task,
        ));

        self.sessions
            .write()
            .insert(conversation_id.to_string(), session.clone());
        self.rearm_idle_timer(conversation_id.to_string(), &session, config.session_idle_timeout_ms);

        if let Some(hook) = &self.on_new_session {
            hook(conversation_id, &session);
        }

        Ok(session)
    }

    /// Release a single session: cancel its idle timer, best-effort close
    /// the browser, remove it from the map. Idempotent.
    pub async fn release(&self, conversation_id: &str) {
        let removed = self.sessions.write().remove(conversation_id);
        if let Some(session) = removed {
            session.cancel_idle_timer();
            session.close().await;
        }
    }

    /// Close every live session in parallel. Used on gateway shutdown.
    pub async fn release_all(&self) {
        let sessions: Vec<Arc<BrowserSession>> = {
            let mut map = self.sessions.write();
            map.drain().map(|(_, v)| v).collect()
        };
        let closes = sessions.iter().map(|s| {
            s.cancel_idle_timer();
            s.close()
        });
        futures_util::future::join_all(closes).await;
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.sessions.read().contains_key(conversation_id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }

    async fn evict_lru_if_at_capacity(&self, max_sessions: usize) {
        let lru_id = {
            let sessions = self.sessions.read();
            if sessions.len() < max_sessions {
                None
            } else {
                sessions
                    .values()
                    .min_by_key(|s| s.last_access_ms.load(Ordering::Relaxed))
                    .map(|s| s.conversation_id.clone())
            }
        };

        if let Some(id) = lru_id {
            tracing::info!(conversation_id = %id, "evicting LRU browser session at capacity");
            self.release(&id).await;
        }
    }

    /// Cancel any previous idle timer for this session and install a fresh
    /// one. `timeout_ms <= 0` disables idle eviction entirely.
    fn rearm_idle_timer(
        self: &Arc<Self>,
        conversation_id: String,
        session: &Arc<BrowserSession>,
        timeout_ms: i64,
    ) {
        session.cancel_idle_timer();
        if timeout_ms <= 0 {
            return;
        }

        let pool = Arc::clone(self);
        let duration = std::time::Duration::from_millis(timeout_ms as u64);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            tracing::debug!(conversation_id, "browser session idle timeout");
            pool.release(&conversation_id).await;
        });
        session.set_idle_timer(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_starts_empty() {
        let pool = BrowserSessionPool::new(BrowserPoolConfig::default());
        assert_eq!(pool.active_count(), 0);
        assert!(!pool.is_active("conv-1"));
    }
}
