//! Session lifecycle events.

/// Events broadcast when the session changes, for components that hold
/// session-scoped resources such as the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Interactive login succeeded.
    LoggedIn {
        /// Id of the signed-in user.
        user_id: i64,
        /// Tenant of the signed-in user.
        company_id: Option<i64>,
    },
    /// Explicit logout.
    LoggedOut,
    /// The session ended without user action.
    Expired,
    /// A token refresh failed; the session has been cleared.
    RefreshFailed,
    /// Tokens were refreshed.
    TokensRefreshed {
        /// Preview of the new access token.
        token_preview: String,
    },
    /// Profile was re-fetched.
    ProfileRefreshed,
}

impl SessionEvent {
    /// Returns true if the event ends the session.
    #[must_use]
    pub const fn ends_session(&self) -> bool {
        matches!(self, Self::LoggedOut | Self::Expired | Self::RefreshFailed)
    }
}
