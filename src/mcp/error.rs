use std::sync::Arc;

use thiserror::Error;

use crate::mcp::backend::BackendId;

/// Failure raised by an automation backend: initialization probes, script
/// runs and HTTP fetches.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("automation access denied for {app}: {message}")]
    AccessDenied { app: &'static str, message: String },

    #[error("script error: {0}")]
    Script(String),

    #[error("{0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Outcome of a failed `resolve`. Cloneable so every caller joined onto one
/// in-flight load observes the same failure.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("failed to initialize {backend} backend: {source}")]
    Init {
        backend: BackendId,
        source: Arc<BackendError>,
    },

    #[error("{backend} backend load was aborted")]
    Aborted { backend: BackendId },

    #[error("{backend} backend returned a {actual} capability")]
    Mismatch {
        backend: BackendId,
        actual: BackendId,
    },
}

/// Tool-call scoped failure; rendered as an `isError` result.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// JSON-RPC level failure. Anything here is a protocol problem rather than a
/// tool problem.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl McpError {
    pub fn code(&self) -> i32 {
        match self {
            McpError::Parse(_) => -32700,
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) => -32602,
            McpError::Internal(_) => -32603,
        }
    }
}

pub type McpResult<T> = Result<T, McpError>;
