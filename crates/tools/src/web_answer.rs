//! `web_answer` — ask a question that needs current web information and get
//! back a synthesized answer (as opposed to `web_search`'s raw result list).
//!
//! Two backends, selected by the builder per §4.3's gating rule
//! ("if perplexity or fallback key available and enabled"):
//! - [`PerplexityAnswerTool`] calls Perplexity's `sonar` chat endpoint, which
//!   is OpenAI-compatible (same request/response shape as every other
//!   `openai_compat`-style adapter in this workspace).
//! - [`FallbackAnswerTool`] runs `web_search` then asks the active chat
//!   provider to synthesize an answer from the snippets.

use async_trait::async_trait;
use serde_json::{Value, json};
use spaceduck_domain::error::{Error, Result};
use spaceduck_domain::tool::Message;
use std::sync::Arc;

use crate::registry::{Tool, ToolOutput};
use spaceduck_providers::{ChatRequest, LlmProvider};

fn parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "question": { "type": "string", "description": "The question to answer using current web information." }
        },
        "required": ["question"]
    })
}

pub struct PerplexityAnswerTool {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl PerplexityAnswerTool {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: "sonar".to_string(),
        }
    }
}

#[async_trait]
impl Tool for PerplexityAnswerTool {
    fn name(&self) -> &str {
        "web_answer"
    }

    fn description(&self) -> &str {
        "Answer a question using current web information, with citations."
    }

    fn parameters(&self) -> Value {
        parameters()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let question = match args.get("question").and_then(Value::as_str) {
            Some(q) => q,
            None => return Ok(ToolOutput::error("question is required")),
        };

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": question }],
        });

        let response = self
            .client
            .post("https://api.perplexity.ai/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(ToolOutput::error(format!(
                "perplexity returned http {}",
                response.status().as_u16()
            )));
        }

        let parsed: Value = response.json().await.map_err(|e| Error::Http(e.to_string()))?;
        let content = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(ToolOutput::ok(content))
    }
}

/// `web_search` + active chat provider, used when no Perplexity key is
/// configured but `web_answer` is still enabled with a search provider.
pub struct FallbackAnswerTool {
    search: Arc<dyn Tool>,
    llm: Arc<dyn LlmProvider>,
}

impl FallbackAnswerTool {
    pub fn new(search: Arc<dyn Tool>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { search, llm }
    }
}

#[async_trait]
impl Tool for FallbackAnswerTool {
    fn name(&self) -> &str {
        "web_answer"
    }

    fn description(&self) -> &str {
        "Answer a question using current web information, with citations."
    }

    fn parameters(&self) -> Value {
        parameters()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let question = match args.get("question").and_then(Value::as_str) {
            Some(q) => q,
            None => return Ok(ToolOutput::error("question is required")),
        };

        let search_result = self
            .search
            .execute(json!({"query": question, "count": 5}))
            .await?;
        if search_result.is_error {
            return Ok(ToolOutput::error(search_result.content));
        }

        let prompt = format!(
            "Search results for the question \"{question}\":\n{}\n\n\
             Using only these results, answer the question concisely and cite the URLs you relied on.",
            search_result.content
        );

        let chat_response = self
            .llm
            .chat(&ChatRequest {
                messages: vec![Message::user(prompt)],
                ..Default::default()
            })
            .await?;

        Ok(ToolOutput::ok(chat_response.content))
    }
}
