//! Built-in tool registry (C5, §4.3).

pub mod browser_tools;
pub mod builder;
pub mod chart;
pub mod config_tool;
pub mod marker;
pub mod registry;
pub mod seams;
pub mod web_answer;
pub mod web_fetch;
pub mod web_search;

pub use builder::{ToolBuilderDeps, build_tool_registry};
pub use registry::{Tool, ToolOutput, ToolRegistry, ToolResult};
pub use seams::{AttachmentStore, ConfigStore};
