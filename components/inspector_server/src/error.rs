//! Error types for the inspector server

use backend_bridge::BridgeError;
use thiserror::Error;

/// Errors that can occur in the inspector server
#[derive(Error, Debug)]
pub enum InspectorServerError {
    /// Listener could not bind
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Target identifier cannot be embedded in URLs unescaped
    #[error("Invalid target identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Backend bridge is gone
    #[error("Backend bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for inspector server operations
pub type Result<T> = std::result::Result<T, InspectorServerError>;
