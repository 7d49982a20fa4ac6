//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The provided URL is invalid or malformed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A token does not have the three-segment shape or its payload is unreadable.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A realtime frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A state machine was asked to perform a transition it does not allow.
    #[error("invalid transition from {from} on {event}")]
    InvalidTransition {
        /// State the machine was in.
        from: &'static str,
        /// Event that was rejected.
        event: &'static str,
    },

    /// An identifier is invalid or empty.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
