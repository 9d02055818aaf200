use rusqlite::Connection;
use spaceduck_domain::{Error, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Shared SQLite connection behind a blocking-task bridge. `rusqlite` is
/// synchronous; every query runs inside `spawn_blocking` so callers never
/// block the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&path)?;
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
            Ok(conn)
        })
        .await
        .map_err(|e| Error::Storage(format!("connect task panicked: {e}")))?
        .map_err(|e| Error::Storage(format!("failed to open database: {e}")))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_blocking(crate::migrations::apply).await?;
        Ok(store)
    }

    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("failed to open database: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Storage(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_blocking(crate::migrations::apply).await?;
        Ok(store)
    }

    /// Run a synchronous closure against the connection on the blocking
    /// pool. Every repository method is a thin wrapper around this.
    pub(crate) async fn run_blocking<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().expect("sqlite connection mutex poisoned");
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Storage(format!("blocking task panicked: {e}")))?
        .map_err(|e| Error::Storage(e.to_string()))
    }
}
