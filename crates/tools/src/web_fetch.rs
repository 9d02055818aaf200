//! `web_fetch` — fetch a URL, convert HTML to Markdown, pass through other
//! allowed text content types as-is.
//!
//! Grounded on the agent framework example's `browse` tool: same redirect
//! cap, byte cap, and content-type allowlist, same style/script stripping
//! before the HTML -> Markdown pass.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde_json::{Value, json};
use spaceduck_domain::error::{Error, Result};
use std::time::Duration;

use crate::registry::{Tool, ToolOutput};

const MAX_REDIRECTS: usize = 5;
const MAX_BYTES: usize = 20 * 1024 * 1024;
const SUPPORTED_SCHEMES: [&str; 2] = ["http", "https"];

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent("spaceduck-gateway/0.1")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Internal(format!("building web_fetch client: {e}")))?;
        Ok(Self { client })
    }
}

fn strip_styles_and_scripts(html: &str) -> String {
    let style_re = Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex");
    let script_re = Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex");
    let without_styles = style_re.replace_all(html, "");
    script_re.replace_all(&without_styles, "").to_string()
}

fn content_type_of(response: &reqwest::Response) -> Result<String> {
    let header = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Provider {
            provider: "web_fetch".into(),
            message: "missing or invalid Content-Type header".into(),
        })?;

    header
        .split(';')
        .next()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .ok_or_else(|| Error::Provider {
            provider: "web_fetch".into(),
            message: "missing or invalid Content-Type header".into(),
        })
}

fn is_html(content_type: &str) -> bool {
    content_type == "text/html" || content_type == "application/xhtml+xml"
}

fn is_allowed_text(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type == "application/json"
        || content_type.ends_with("+json")
        || content_type == "application/xml"
        || content_type.ends_with("+xml")
}

fn validate_scheme(url: &Url) -> Result<()> {
    if SUPPORTED_SCHEMES.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "unsupported url scheme: {}",
            url.scheme()
        )))
    }
}

async fn fetch_with_redirects(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let mut current =
        Url::parse(url).map_err(|e| Error::Validation(format!("invalid url: {e}")))?;
    validate_scheme(&current)?;

    for hop in 0..=MAX_REDIRECTS {
        let resp = client
            .get(current.clone())
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if resp.status().is_redirection() {
            let loc = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .ok_or_else(|| Error::Http("redirect missing Location header".into()))?
                .to_str()
                .map_err(|e| Error::Http(format!("invalid redirect Location: {e}")))?;

            if hop == MAX_REDIRECTS {
                return Err(Error::Http(format!(
                    "too many redirects (max {MAX_REDIRECTS})"
                )));
            }
            current = current
                .join(loc)
                .map_err(|e| Error::Http(format!("failed to resolve redirect '{loc}': {e}")))?;
            validate_scheme(&current)?;
            continue;
        }

        if !resp.status().is_success() {
            return Err(Error::Http(format!("http error {}", resp.status().as_u16())));
        }
        return Ok(resp);
    }

    unreachable!("redirect loop always returns or errors")
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL. HTML is converted to Markdown; other allowed text content is returned as plain text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to fetch (http/https)." }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation("url is required".into()))?;

        let response = match fetch_with_redirects(&self.client, url).await {
            Ok(r) => r,
            Err(e) => return Ok(ToolOutput::error(e.to_string())),
        };

        let content_type = match content_type_of(&response) {
            Ok(ct) => ct,
            Err(e) => return Ok(ToolOutput::error(e.to_string())),
        };

        if !is_html(&content_type) && !is_allowed_text(&content_type) {
            return Ok(ToolOutput::error(format!(
                "unsupported content-type: {content_type}"
            )));
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolOutput::error(format!("failed to read response body: {e}"))),
        };
        if bytes.len() > MAX_BYTES {
            return Ok(ToolOutput::error(format!(
                "response exceeded max bytes ({MAX_BYTES})"
            )));
        }

        let body = String::from_utf8_lossy(&bytes).into_owned();
        if is_html(&content_type) {
            let cleaned = strip_styles_and_scripts(&body);
            Ok(ToolOutput::ok(fast_html2md::parse_html(&cleaned, true)))
        } else {
            Ok(ToolOutput::ok(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_style_and_script_tags() {
        let html = "<html><head><style>body{color:red}</style><script>alert(1)</script></head><body><h1>Hi</h1></body></html>";
        let cleaned = strip_styles_and_scripts(html);
        assert!(!cleaned.contains("style"));
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("<h1>Hi</h1>"));
    }

    #[test]
    fn recognizes_html_types() {
        assert!(is_html("text/html"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("text/plain"));
    }

    #[test]
    fn recognizes_allowed_text_types() {
        assert!(is_allowed_text("text/plain"));
        assert!(is_allowed_text("application/json"));
        assert!(!is_allowed_text("application/octet-stream"));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(validate_scheme(&url).is_err());
    }
}
