//! Agent error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed stream event: {0}")]
    MalformedStream(String),

    /// The loop hit its round cap and was force-terminated.
    #[error("Tool loop exceeded {0} rounds")]
    MaxRoundsExceeded(usize),

    #[error("Tool '{name}' failed: {message}")]
    ToolExecutionFailed { name: String, message: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
