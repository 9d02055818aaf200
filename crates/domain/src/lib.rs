//! Shared types for the Spaceduck gateway: config schema, error taxonomy,
//! provider-agnostic message/tool/stream types, and the persisted data
//! model (conversations, sessions, memory records, tasks).

pub mod capability;
pub mod config;
pub mod error;
pub mod model;
pub mod revision;
pub mod stream;
pub mod tool;

pub use error::{Error, Result};
