//! Error types for punchr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in punchr
#[derive(Debug, Error)]
pub enum PunchrError {
    /// The durable key-value store is unreachable or rejected an operation.
    /// Transient: callers retry the whole user-visible action.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// No matching portal page could be located
    #[error("Page unreachable: {0}")]
    PageUnreachable(String),

    /// The portal's action handler reported failure (e.g. button not found)
    #[error("Action rejected: {0}")]
    ActionRejected(String),

    /// Requested schedule time has already elapsed
    #[error("Cannot schedule in the past: {0}")]
    PastSchedule(String),

    /// Task not found in storage
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for punchr operations
pub type Result<T> = std::result::Result<T, PunchrError>;
