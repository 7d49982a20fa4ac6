//! Application error types

use chatdesk_domain::{DomainError, Notification, NotificationKind};
use thiserror::Error;

/// Message shown when login fails without a usable server message.
pub const LOGIN_FALLBACK_MESSAGE: &str =
    "Unable to sign in. Check your credentials and try again.";

/// Message shown when registration fails without a usable server message.
pub const REGISTER_FALLBACK_MESSAGE: &str = "Unable to create the account. Try again later.";

/// Errors from calls to the auth or backend services.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received.
    #[error("network unreachable: {0}")]
    Network(String),

    /// The call was rejected with 401.
    #[error("not authenticated")]
    Unauthorized {
        /// Message from the error body, if any.
        message: Option<String>,
    },

    /// The server rejected the request with a 4xx and a message for the user.
    #[error("{message}")]
    Validation {
        /// HTTP status.
        status: u16,
        /// Server-provided message.
        message: String,
    },

    /// The server failed with a 5xx.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Server-provided message or status text.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Categorizes a non-success status with an optional body message.
    #[must_use]
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            401 => Self::Unauthorized { message },
            400..=499 => Self::Validation {
                status,
                message: message.unwrap_or_else(|| format!("Request failed with status {status}")),
            },
            _ => Self::Server {
                status,
                message: message.unwrap_or_else(|| format!("Server responded with status {status}")),
            },
        }
    }

    /// Returns true for 401 responses.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Network unreachable. Check your connection.".to_string(),
            Self::Unauthorized { .. } => "Your session has expired. Please sign in again.".to_string(),
            Self::Validation { message, .. } => message.clone(),
            Self::Server { .. } => "The server failed to process the request. Try again later.".to_string(),
            Self::Decode(_) => "The server sent an unexpected response.".to_string(),
        }
    }

    /// Notification for this error.
    #[must_use]
    pub fn notification(&self) -> Notification {
        let kind = match self {
            Self::Network(_) => NotificationKind::NetworkUnreachable,
            Self::Unauthorized { .. } => NotificationKind::SessionExpired,
            Self::Validation { .. } => NotificationKind::Validation,
            Self::Server { .. } | Self::Decode(_) => NotificationKind::ServerError,
        };
        Notification::error(kind, self.user_message())
    }
}

/// Failure of an interactive auth flow, carrying the message to show inline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthFailure {
    /// User-facing message.
    pub message: String,
}

impl AuthFailure {
    /// Creates a failure with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Surfaces the server-provided message, or the generic login fallback.
    #[must_use]
    pub fn from_api(error: &ApiError) -> Self {
        Self::from_api_or(error, LOGIN_FALLBACK_MESSAGE)
    }

    /// Surfaces the server-provided message, or `fallback`.
    #[must_use]
    pub fn from_api_or(error: &ApiError, fallback: &str) -> Self {
        match error {
            ApiError::Validation { message, .. }
            | ApiError::Unauthorized {
                message: Some(message),
            } if !message.trim().is_empty() => Self::new(message.clone()),
            _ => Self::new(fallback),
        }
    }
}

/// Errors from the realtime channel's explicit operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel is not open.
    #[error("realtime channel is not open")]
    NotOpen,
}

/// Application-level errors.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// A remote call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An auth flow failed.
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    /// There is no session to perform the call with.
    #[error("not signed in")]
    NotSignedIn,

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
