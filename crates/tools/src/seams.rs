//! Seams the tool builder depends on but does not implement itself.
//!
//! The gateway crate owns the real config store and attachment store; these
//! traits let `spaceduck-tools` stay decoupled from it (the same shape as
//! the provider/auth crates, which take trait objects rather than depending
//! on the gateway).

use async_trait::async_trait;
use serde_json::Value;
use spaceduck_domain::error::Result;

/// Read/write access to the live config document, addressed by JSON
/// Pointer, for the `config_get` / `config_set` tools (§4.3).
#[async_trait]
pub trait ConfigStore: Send + Sync {
    fn get(&self, pointer: &str) -> Option<Value>;
    async fn set(&self, pointer: &str, value: Value) -> Result<()>;
    /// True for paths under a `secrets` segment — `config_get`/`config_set`
    /// refuse these with a user-visible message rather than ever echoing or
    /// accepting a secret value through the tool surface.
    fn is_secret_path(&self, pointer: &str) -> bool;
}

/// Persisted conversation attachments, for `marker_scan` to read source
/// files and (eventually) for other tools to save derived artifacts.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn read(&self, attachment_id: &str) -> Result<Vec<u8>>;
}
