//! `marker_scan` — OCR/layout-extract a document attachment via the
//! external `marker` binary (https://github.com/VikParuchuri/marker).
//!
//! Only registered by the builder when the binary is actually on `PATH`
//! (checked with `which`, the same crate used for binary discovery in the
//! exec/process tooling this workspace carries forward) and an attachment
//! store is available — there is no in-process fallback.

use async_trait::async_trait;
use serde_json::{Value, json};
use spaceduck_domain::error::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::registry::{Tool, ToolOutput};
use crate::seams::AttachmentStore;

pub struct MarkerScanTool {
    binary_path: String,
    attachments: Arc<dyn AttachmentStore>,
}

impl MarkerScanTool {
    /// Returns `None` if `binary_path` cannot be resolved on `PATH` — the
    /// builder uses this to decide whether to register the tool at all.
    pub fn detect(binary_path: &str, attachments: Arc<dyn AttachmentStore>) -> Option<Self> {
        which::which(binary_path).ok()?;
        Some(Self {
            binary_path: binary_path.to_string(),
            attachments,
        })
    }
}

#[async_trait]
impl Tool for MarkerScanTool {
    fn name(&self) -> &str {
        "marker_scan"
    }

    fn description(&self) -> &str {
        "Extract text and layout from a document attachment (PDF, scanned image) using the marker OCR pipeline."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "attachment_id": { "type": "string", "description": "The attachment to scan." }
            },
            "required": ["attachment_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let attachment_id = match args.get("attachment_id").and_then(Value::as_str) {
            Some(id) => id,
            None => return Ok(ToolOutput::error("attachment_id is required")),
        };

        let bytes = self.attachments.read(attachment_id).await?;

        let tmp_dir = std::env::temp_dir().join(format!("spaceduck-marker-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&tmp_dir).await.map_err(Error::Io)?;
        let input_path: PathBuf = tmp_dir.join(attachment_id);
        {
            let mut file = tokio::fs::File::create(&input_path).await.map_err(Error::Io)?;
            file.write_all(&bytes).await.map_err(Error::Io)?;
        }

        let output = Command::new(&self.binary_path)
            .arg(&input_path)
            .arg("--output_dir")
            .arg(&tmp_dir)
            .output()
            .await
            .map_err(Error::Io)?;

        let _ = tokio::fs::remove_dir_all(&tmp_dir).await;

        if !output.status.success() {
            return Ok(ToolOutput::error(format!(
                "marker exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(ToolOutput::ok(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}
