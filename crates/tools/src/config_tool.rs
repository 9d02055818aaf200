//! `config_get` / `config_set` — let the model read and adjust its own
//! runtime config (§4.3). Secret paths are always rejected: these tools
//! never read or accept a secret value, only the config document proper.

use async_trait::async_trait;
use serde_json::{Value, json};
use spaceduck_domain::error::{Error, Result};
use std::sync::Arc;

use crate::registry::{Tool, ToolOutput};
use crate::seams::ConfigStore;

pub struct ConfigGetTool {
    store: Arc<dyn ConfigStore>,
}

impl ConfigGetTool {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ConfigGetTool {
    fn name(&self) -> &str {
        "config_get"
    }

    fn description(&self) -> &str {
        "Read a value from the gateway config document by JSON Pointer."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "JSON Pointer, e.g. /ai/model" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let path = match args.get("path").and_then(Value::as_str) {
            Some(p) => p,
            None => return Ok(ToolOutput::error("path is required")),
        };
        if self.store.is_secret_path(path) {
            return Ok(ToolOutput::error(
                "refusing to read a secret path through config_get",
            ));
        }
        match self.store.get(path) {
            Some(value) => Ok(ToolOutput::ok(value.to_string())),
            None => Ok(ToolOutput::error(format!("no value at {path}"))),
        }
    }
}

pub struct ConfigSetTool {
    store: Arc<dyn ConfigStore>,
}

impl ConfigSetTool {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ConfigSetTool {
    fn name(&self) -> &str {
        "config_set"
    }

    fn description(&self) -> &str {
        "Write a value into the gateway config document by JSON Pointer."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "JSON Pointer, e.g. /ai/model" },
                "value": {}
            },
            "required": ["path", "value"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let path = match args.get("path").and_then(Value::as_str) {
            Some(p) => p,
            None => return Ok(ToolOutput::error("path is required")),
        };
        if self.store.is_secret_path(path) {
            return Ok(ToolOutput::error(
                "refusing to write a secret path through config_set",
            ));
        }
        let value = match args.get("value") {
            Some(v) => v.clone(),
            None => return Ok(ToolOutput::error("value is required")),
        };

        match self.store.set(path, value).await {
            Ok(()) => Ok(ToolOutput::ok(format!("set {path}"))),
            Err(Error::Validation(msg)) | Err(Error::InvalidPath(msg)) => {
                Ok(ToolOutput::error(msg))
            }
            Err(e) => Err(e),
        }
    }
}
