//! Local-disk attachment storage backing `POST /api/upload` and the
//! `AttachmentStore` seam `crates/tools` reads from when a tool call
//! references an uploaded file. Grounded on `workspace/files.rs`'s
//! root-confined path handling (every id resolves under one fixed
//! directory, never outside it).

use spaceduck_domain::error::{Error, Result};
use spaceduck_domain::model::AttachmentEntry;
use std::path::PathBuf;
use uuid::Uuid;

pub struct LocalAttachmentStore {
    root: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn save(&self, filename: &str, mime: &str, bytes: &[u8]) -> Result<AttachmentEntry> {
        tokio::fs::create_dir_all(&self.root).await?;
        let id = Uuid::new_v4().to_string();
        let local_path = self.root.join(&id);
        tokio::fs::write(&local_path, bytes).await?;
        Ok(AttachmentEntry {
            id,
            local_path: local_path.display().to_string(),
            filename: filename.to_string(),
            mime: mime.to_string(),
            size: bytes.len() as u64,
            created_at: chrono::Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl spaceduck_tools::AttachmentStore for LocalAttachmentStore {
    async fn read(&self, attachment_id: &str) -> Result<Vec<u8>> {
        if attachment_id.is_empty() || attachment_id.contains(['/', '\\']) || attachment_id == ".." {
            return Err(Error::InvalidPath(attachment_id.to_string()));
        }
        let path = self.root.join(attachment_id);
        tokio::fs::read(&path).await.map_err(Error::from)
    }
}
