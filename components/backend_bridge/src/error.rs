//! Error types for the backend dispatch bridge

use thiserror::Error;

/// Errors that can occur when queueing work for the backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The dispatch bridge (and the backend it owns) has been dropped
    #[error("Backend dispatch bridge is gone")]
    BackendGone,
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
