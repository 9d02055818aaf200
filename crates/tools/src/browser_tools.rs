//! Browser family tools — `browser_navigate`, `browser_click`,
//! `browser_type`, `browser_screenshot`.
//!
//! Each tool resolves the calling conversation's session from the shared
//! [`BrowserSessionPool`] via `conversation_id_getter` (the gateway injects
//! the in-flight turn's conversation id; `acquire` launches a browser lazily
//! on first use and keeps it warm for later tool calls in the same turn).

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use serde_json::{Value, json};
use spaceduck_browser::BrowserSessionPool;
use spaceduck_domain::error::Result;
use std::sync::Arc;

use crate::registry::{Tool, ToolOutput};

type ConversationIdGetter = Arc<dyn Fn() -> String + Send + Sync>;

async fn session_page(
    pool: &Arc<BrowserSessionPool>,
    conversation_id_getter: &ConversationIdGetter,
) -> Result<chromiumoxide::Page> {
    let conversation_id = conversation_id_getter();
    let session = pool.acquire(&conversation_id).await?;
    Ok(session.page())
}

pub struct BrowserNavigateTool {
    pool: Arc<BrowserSessionPool>,
    conversation_id_getter: ConversationIdGetter,
}

impl BrowserNavigateTool {
    pub fn new(pool: Arc<BrowserSessionPool>, conversation_id_getter: ConversationIdGetter) -> Self {
        Self {
            pool,
            conversation_id_getter,
        }
    }
}

#[async_trait]
impl Tool for BrowserNavigateTool {
    fn name(&self) -> &str {
        "browser_navigate"
    }

    fn description(&self) -> &str {
        "Navigate the conversation's browser tab to a URL."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let url = match args.get("url").and_then(Value::as_str) {
            Some(u) => u,
            None => return Ok(ToolOutput::error("url is required")),
        };
        let page = session_page(&self.pool, &self.conversation_id_getter).await?;
        match page.goto(url).await {
            Ok(_) => Ok(ToolOutput::ok(format!("navigated to {url}"))),
            Err(e) => Ok(ToolOutput::error(format!("navigation failed: {e}"))),
        }
    }
}

pub struct BrowserClickTool {
    pool: Arc<BrowserSessionPool>,
    conversation_id_getter: ConversationIdGetter,
}

impl BrowserClickTool {
    pub fn new(pool: Arc<BrowserSessionPool>, conversation_id_getter: ConversationIdGetter) -> Self {
        Self {
            pool,
            conversation_id_getter,
        }
    }
}

#[async_trait]
impl Tool for BrowserClickTool {
    fn name(&self) -> &str {
        "browser_click"
    }

    fn description(&self) -> &str {
        "Click the first element matching a CSS selector in the conversation's browser tab."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "selector": { "type": "string" } },
            "required": ["selector"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let selector = match args.get("selector").and_then(Value::as_str) {
            Some(s) => s,
            None => return Ok(ToolOutput::error("selector is required")),
        };
        let page = session_page(&self.pool, &self.conversation_id_getter).await?;
        match page.find_element(selector).await {
            Ok(element) => match element.click().await {
                Ok(_) => Ok(ToolOutput::ok(format!("clicked {selector}"))),
                Err(e) => Ok(ToolOutput::error(format!("click failed: {e}"))),
            },
            Err(e) => Ok(ToolOutput::error(format!("element not found: {e}"))),
        }
    }
}

pub struct BrowserTypeTool {
    pool: Arc<BrowserSessionPool>,
    conversation_id_getter: ConversationIdGetter,
}

impl BrowserTypeTool {
    pub fn new(pool: Arc<BrowserSessionPool>, conversation_id_getter: ConversationIdGetter) -> Self {
        Self {
            pool,
            conversation_id_getter,
        }
    }
}

#[async_trait]
impl Tool for BrowserTypeTool {
    fn name(&self) -> &str {
        "browser_type"
    }

    fn description(&self) -> &str {
        "Type text into the first element matching a CSS selector in the conversation's browser tab."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": { "type": "string" },
                "text": { "type": "string" }
            },
            "required": ["selector", "text"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let selector = match args.get("selector").and_then(Value::as_str) {
            Some(s) => s,
            None => return Ok(ToolOutput::error("selector is required")),
        };
        let text = match args.get("text").and_then(Value::as_str) {
            Some(t) => t,
            None => return Ok(ToolOutput::error("text is required")),
        };
        let page = session_page(&self.pool, &self.conversation_id_getter).await?;
        let element = match page.find_element(selector).await {
            Ok(e) => e,
            Err(e) => return Ok(ToolOutput::error(format!("element not found: {e}"))),
        };
        if let Err(e) = element.click().await {
            return Ok(ToolOutput::error(format!("click failed: {e}")));
        }
        match element.type_str(text).await {
            Ok(_) => Ok(ToolOutput::ok(format!("typed into {selector}"))),
            Err(e) => Ok(ToolOutput::error(format!("type failed: {e}"))),
        }
    }
}

pub struct BrowserScreenshotTool {
    pool: Arc<BrowserSessionPool>,
    conversation_id_getter: ConversationIdGetter,
}

impl BrowserScreenshotTool {
    pub fn new(pool: Arc<BrowserSessionPool>, conversation_id_getter: ConversationIdGetter) -> Self {
        Self {
            pool,
            conversation_id_getter,
        }
    }
}

#[async_trait]
impl Tool for BrowserScreenshotTool {
    fn name(&self) -> &str {
        "browser_screenshot"
    }

    fn description(&self) -> &str {
        "Capture a PNG screenshot of the conversation's browser tab, returned base64-encoded."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> Result<ToolOutput> {
        let page = session_page(&self.pool, &self.conversation_id_getter).await?;
        let params = chromiumoxide::page::ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        match page.screenshot(params).await {
            Ok(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                Ok(ToolOutput::ok(encoded))
            }
            Err(e) => Ok(ToolOutput::error(format!("screenshot failed: {e}"))),
        }
    }
}
