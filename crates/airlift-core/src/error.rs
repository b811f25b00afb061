use thiserror::Error;

/// Errors that can occur in the core transfer primitives.
#[derive(Debug, Error)]
pub enum Error {
    /// A content path was absolute or tried to escape the content root.
    #[error("invalid content path: {0}")]
    InvalidPath(String),

    /// A settings value failed validation.
    #[error("settings error: {0}")]
    Settings(String),

    /// TOML parsing or serialization error.
    #[error("toml error: {0}")]
    Toml(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for airlift-core operations.
pub type Result<T> = std::result::Result<T, Error>;
