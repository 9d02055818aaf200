//! Context Builder (C8 step 2, spec §4.6): assembles the ordered message
//! sequence `[systemPrompt, ...memoryHints, ...conversationTail]` handed to
//! the provider at the start of every agent turn.

pub mod builder;
pub mod injection;
pub mod report;
pub mod truncation;

pub use builder::ContextBuilder;
pub use report::{ContextReport, MessageReport};
