//! Error types for the ATTPs verify agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AttpsError>;

#[derive(Error, Debug)]
pub enum AttpsError {

    // =============================
    // Pipeline Errors
    // =============================

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Client construction error: {0}")]
    ClientConstruction(String),

    /// Shown to the user verbatim, so no prefix.
    #[error("{0}")]
    Submission(String),

    /// Shown to the user verbatim, so no prefix.
    #[error("{0}")]
    Confirmation(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
