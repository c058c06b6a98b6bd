// Protocol message errors
// Raised when a payload cannot be viewed as a structured protocol message

use thiserror::Error;

/// Errors produced while reading a protocol message
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The payload is not valid JSON
    #[error("Malformed protocol message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload is valid JSON but not a JSON object
    #[error("Protocol message must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Result type for protocol message operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
