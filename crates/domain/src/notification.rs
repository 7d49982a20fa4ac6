//! User-facing notifications.

use serde::{Deserialize, Serialize};

/// Category of a notification, driving how it is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// No response was received.
    NetworkUnreachable,
    /// The server answered with a 5xx status.
    ServerError,
    /// The server rejected the request with a message for the user.
    Validation,
    /// The session ended and the user must sign in again.
    SessionExpired,
    /// A message arrived in a dialog.
    NewMessage,
    /// A new appeal was opened.
    NewAppeal,
    /// Realtime channel status or server-pushed error.
    Realtime,
}

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// Informational.
    Info,
    /// Something degraded but recoverable.
    Warning,
    /// An operation failed.
    Error,
}

/// A dismissible notification for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Category.
    pub kind: NotificationKind,
    /// Severity.
    pub level: NotificationLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub fn new(kind: NotificationKind, level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
        }
    }

    /// Informational notification.
    #[must_use]
    pub fn info(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self::new(kind, NotificationLevel::Info, message)
    }

    /// Error notification.
    #[must_use]
    pub fn error(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self::new(kind, NotificationLevel::Error, message)
    }
}
