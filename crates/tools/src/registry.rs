//! Tool trait and registry (C5, §4.3).
//!
//! Mirrors the `Tool` / `ToolRegistry` shape used by the agent-framework
//! example in the pack: a name-keyed map of `Arc<dyn Tool>`, a single
//! `execute` entry point, and schema definitions handed to the provider as
//! part of the chat request.

use async_trait::async_trait;
use serde_json::Value;
use spaceduck_domain::error::Result;
use spaceduck_domain::tool::{ToolCall, ToolDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// The outcome of a single tool invocation, before it's wrapped in a
/// `ToolResult` by the registry.
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// A tool callable by the agent loop. `parameters()` is the JSON Schema
/// handed to the model as part of the tool's definition.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<ToolOutput>;
}

/// The result of dispatching a [`ToolCall`] through the registry — always
/// produced, even for an unknown tool name or a handler error (§4.3: "tool
/// handler throws -> yield tool_result with isError:true", never propagated
/// as a turn-ending failure).
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn size(&self) -> usize {
        self.tools.len()
    }

    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Same as [`Self::get_definitions`] but restricted to `allow_list`
    /// (an empty list means no restriction). Used by a scheduled task's
    /// run to keep the agent loop from reaching for tools the task
    /// definition didn't ask for.
    pub fn get_definitions_allowed(&self, allow_list: &[String]) -> Vec<ToolDefinition> {
        if allow_list.is_empty() {
            return self.get_definitions();
        }
        self.tools
            .values()
            .filter(|t| allow_list.iter().any(|name| name == t.name()))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// [`Self::execute`] restricted to `allow_list` — a call for a tool
    /// outside the list is rejected the same way an unknown tool name is,
    /// rather than silently running it.
    pub async fn execute_allowed(&self, call: &ToolCall, allow_list: &[String]) -> ToolResult {
        if !allow_list.is_empty() && !allow_list.iter().any(|name| name == &call.tool_name) {
            return ToolResult {
                call_id: call.call_id.clone(),
                content: format!("tool not permitted for this task: {}", call.tool_name),
                is_error: true,
            };
        }
        self.execute(call).await
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        match self.tools.get(&call.tool_name) {
            Some(tool) => match tool.execute(call.arguments.clone()).await {
                Ok(out) => ToolResult {
                    call_id: call.call_id.clone(),
                    content: out.content,
                    is_error: out.is_error,
                },
                Err(e) => {
                    tracing::warn!(tool = %call.tool_name, error = %e, "tool execution failed");
                    ToolResult {
                        call_id: call.call_id.clone(),
                        content: e.to_string(),
                        is_error: true,
                    }
                }
            },
            None => ToolResult {
                call_id: call.call_id.clone(),
                content: format!("unknown tool: {}", call.tool_name),
                is_error: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: Value) -> Result<ToolOutput> {
            Ok(ToolOutput::ok(args.to_string()))
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            call_id: "call-1".into(),
            tool_name: name.into(),
            arguments: serde_json::json!({"x": 1}),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result_not_a_failure() {
        let registry = ToolRegistry::new();
        let result = registry.execute(&call("nope")).await;
        assert!(result.is_error);
        assert_eq!(result.call_id, "call-1");
    }

    #[tokio::test]
    async fn registered_tool_executes() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.has("echo"));
        assert_eq!(registry.size(), 1);
        let result = registry.execute(&call("echo")).await;
        assert!(!result.is_error);
        assert_eq!(result.content, r#"{"x":1}"#);
    }

    #[test]
    fn definitions_expose_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let defs = registry.get_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }
}
