//! `web_search` — Brave Search API adapter.
//!
//! Follows the same request/response HTTP pattern as the provider adapters
//! (`reqwest::Client`, bearer-style header auth, `serde_json::Value`
//! response parsing) rather than introducing a dedicated search crate.

use async_trait::async_trait;
use serde_json::{Value, json};
use spaceduck_domain::error::{Error, Result};

use crate::registry::{Tool, ToolOutput};

pub struct BraveSearchTool {
    client: reqwest::Client,
    api_key: String,
}

impl BraveSearchTool {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Tool for BraveSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return a list of result titles, URLs, and snippets."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query." },
                "count": { "type": "integer", "description": "Number of results (default 5, max 20)." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let query = match args.get("query").and_then(Value::as_str) {
            Some(q) => q,
            None => return Ok(ToolOutput::error("query is required")),
        };
        let count = args
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(5)
            .clamp(1, 20);

        let response = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(ToolOutput::error(format!(
                "brave search returned http {}",
                response.status().as_u16()
            )));
        }

        let body: Value = response.json().await.map_err(|e| Error::Http(e.to_string()))?;
        let results: Vec<Value> = body
            .get("web")
            .and_then(|w| w.get("results"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let formatted: Vec<Value> = results
            .iter()
            .filter_map(|r| {
                Some(json!({
                    "title": r.get("title")?.as_str()?,
                    "url": r.get("url")?.as_str()?,
                    "snippet": r.get("description").and_then(Value::as_str).unwrap_or(""),
                }))
            })
            .collect();

        Ok(ToolOutput::ok(
            serde_json::to_string(&formatted).map_err(Error::Json)?,
        ))
    }
}
