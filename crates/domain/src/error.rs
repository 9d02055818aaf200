/// Shared error type used across every Spaceduck crate.
///
/// Variants map to the surface strings in the gateway's error taxonomy;
/// `code()` returns the exact string sent over HTTP/WS so the mapping stays
/// in one place as client-facing behavior.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid json path: {0}")]
    InvalidPath(String),

    #[error("invalid patch op: {0}")]
    InvalidOp(String),

    #[error("config validation failed: {0}")]
    Validation(String),

    #[error("config revision conflict: expected {expected}, actual {actual}")]
    Conflict { expected: String, actual: String },

    #[error("auth: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("memory error: {0}")]
    Memory(String),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// The surface string sent to clients (HTTP body / WS error envelope),
    /// per the gateway's error taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "INTERNAL_ERROR",
            Error::Json(_) => "INVALID_JSON",
            Error::Http(_) => "UPSTREAM_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Provider { .. } => "UNKNOWN",
            Error::ToolNotFound(_) => "TOOL_NOT_FOUND",
            Error::InvalidPath(_) => "INVALID_PATH",
            Error::InvalidOp(_) => "INVALID_OP",
            Error::Validation(_) => "VALIDATION",
            Error::Conflict { .. } => "CONFLICT",
            Error::Auth(_) => "Unauthorized",
            Error::RateLimited(_) => "rate_limited",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Storage(_) => "INTERNAL_ERROR",
            Error::Agent(_) => "AGENT_ERROR",
            Error::Memory(_) => "MEMORY_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
