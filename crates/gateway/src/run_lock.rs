//! Run Lock (C6, §4.4): at most one agent run per conversation at a time,
//! serialized against both WS-driven turns and scheduled task runs.
//!
//! Unlike the teacher's `SessionLockMap` (a busy-reject semaphore guard),
//! this is a true FIFO queue per conversation id: a second caller for the
//! same id waits its turn instead of being rejected, and a holder that
//! tries to re-acquire its own still-held id gets `DeadlockError` instead
//! of hanging forever.

use spaceduck_domain::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::sync::Mutex;

struct Lane {
    /// `Some` while a holder has this id locked.
    held_by: Option<u64>,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl Lane {
    fn new() -> Self {
        Self { held_by: None, waiters: VecDeque::new() }
    }
}

/// A held run lock. Dropping it (or calling [`RunLockGuard::release`]
/// explicitly) hands the lane to the next FIFO waiter, if any.
pub struct RunLockGuard {
    conversation_id: String,
    lock: Arc<RunLock>,
    released: bool,
}

impl RunLockGuard {
    pub fn release(mut self) {
        self.released = true;
        self.lock.clone().release_sync(&self.conversation_id);
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if !self.released {
            self.lock.clone().release_sync(&self.conversation_id);
        }
    }
}

pub struct RunLock {
    lanes: Mutex<HashMap<String, Lane>>,
    next_holder_id: std::sync::atomic::AtomicU64,
}

impl RunLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lanes: Mutex::new(HashMap::new()),
            next_holder_id: std::sync::atomic::AtomicU64::new(1),
        })
    }

    /// Acquire the lane for `conversation_id`. Returns immediately if it's
    /// unheld, otherwise waits in FIFO order behind earlier callers.
    /// A caller that already holds this id (re-entrant acquisition, e.g. a
    /// tool handler looping back into the agent loop for the same
    /// conversation) gets [`Error::Agent`] with the `DeadlockError` marker
    /// rather than blocking forever on itself.
    pub async fn acquire(self: &Arc<Self>, conversation_id: &str, holder: u64) -> Result<RunLockGuard> {
        let wait = {
            let mut lanes = self.lanes.lock().await;
            let lane = lanes.entry(conversation_id.to_string()).or_insert_with(Lane::new);
            if lane.held_by == Some(holder) {
                return Err(Error::Agent(format!(
                    "DeadlockError: holder {holder} already holds the run lock for {conversation_id}"
                )));
            }
            if lane.held_by.is_none() {
                lane.held_by = Some(holder);
                None
            } else {
                let (tx, rx) = oneshot::channel();
                lane.waiters.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = wait {
            rx.await.map_err(|_| Error::Agent("run lock lane dropped while waiting".into()))?;
            let mut lanes = self.lanes.lock().await;
            if let Some(lane) = lanes.get_mut(conversation_id) {
                lane.held_by = Some(holder);
            }
        }

        Ok(RunLockGuard {
            conversation_id: conversation_id.to_string(),
            lock: self.clone(),
            released: false,
        })
    }

    fn release_sync(self: Arc<Self>, conversation_id: &str) {
        let conversation_id = conversation_id.to_string();
        let this = self.clone();
        tokio::spawn(async move {
            let mut lanes = this.lanes.lock().await;
            let Some(lane) = lanes.get_mut(&conversation_id) else { return };
            lane.held_by = None;
            if let Some(next) = lane.waiters.pop_front() {
                // Hand off immediately; the idempotent release above means
                // a caller that double-releases is a harmless no-op here.
                let _ = next.send(());
            } else if lane.waiters.is_empty() {
                lanes.remove(&conversation_id);
            }
        });
    }

    pub async fn is_locked(&self, conversation_id: &str) -> bool {
        self.lanes.lock().await.get(conversation_id).map(|l| l.held_by.is_some()).unwrap_or(false)
    }

    pub async fn active_conversation_ids(&self) -> Vec<String> {
        self.lanes
            .lock()
            .await
            .iter()
            .filter(|(_, lane)| lane.held_by.is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sequential_access_is_allowed() {
        let lock = RunLock::new();
        let guard = lock.acquire("c1", 1).await.unwrap();
        guard.release();
        let _guard2 = lock.acquire("c1", 2).await.unwrap();
    }

    #[tokio::test]
    async fn second_caller_waits_and_gets_its_turn() {
        let lock = RunLock::new();
        let guard = lock.acquire("c1", 1).await.unwrap();
        assert!(lock.is_locked("c1").await);

        let lock2 = lock.clone();
        let waiter = tokio::spawn(async move {
            let _g = lock2.acquire("c1", 2).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        guard.release();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn different_conversations_run_concurrently() {
        let lock = RunLock::new();
        let _g1 = lock.acquire("c1", 1).await.unwrap();
        let g2 = lock.acquire("c2", 2).await;
        assert!(g2.is_ok());
    }

    #[tokio::test]
    async fn reentrant_acquire_by_the_same_holder_is_a_deadlock_error() {
        let lock = RunLock::new();
        let _guard = lock.acquire("c1", 1).await.unwrap();
        let err = lock.acquire("c1", 1).await.unwrap_err();
        assert!(err.to_string().contains("DeadlockError"));
    }

    #[tokio::test]
    async fn release_is_idempotent_safe_via_drop() {
        let lock = RunLock::new();
        let guard = lock.acquire("c1", 1).await.unwrap();
        guard.release();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!lock.is_locked("c1").await);
    }
}
