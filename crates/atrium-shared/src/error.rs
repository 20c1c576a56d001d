use thiserror::Error;

/// Errors produced by the messaging core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Malformed input (empty channel name, blank content, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The actor lacks the role or ownership the action requires.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// The operation would violate a structural invariant
    /// (e.g. removing the last channel admin, editing a tombstone).
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// A remote collaborator call failed (network / service).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Referenced message, channel, workspace or actor does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CoreError>;
