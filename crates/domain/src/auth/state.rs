//! Authentication state machine.

use crate::error::{DomainError, DomainResult};

use super::types::UserProfile;

/// Whether this client currently holds an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Application has not started its session check.
    #[default]
    Uninitialized,
    /// Session check in progress.
    Checking,
    /// Valid session with the profile held in memory.
    Authenticated {
        /// Profile of the signed-in user.
        user: UserProfile,
    },
    /// No valid session.
    Unauthenticated,
}

/// Inputs that move the auth state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthTransition {
    /// Application start (or a forced re-check).
    StartCheck,
    /// Stored session is valid and the profile is known.
    SessionValid(UserProfile),
    /// Stored session is missing, expired, or its profile could not be loaded.
    SessionInvalid,
    /// Interactive login succeeded.
    SignedIn(UserProfile),
    /// Profile re-fetched while signed in.
    ProfileRefreshed(UserProfile),
    /// Explicit logout.
    SignedOut,
}

impl AuthTransition {
    const fn name(&self) -> &'static str {
        match self {
            Self::StartCheck => "start_check",
            Self::SessionValid(_) => "session_valid",
            Self::SessionInvalid => "session_invalid",
            Self::SignedIn(_) => "signed_in",
            Self::ProfileRefreshed(_) => "profile_refreshed",
            Self::SignedOut => "signed_out",
        }
    }
}

impl AuthState {
    /// Short state name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Checking => "checking",
            Self::Authenticated { .. } => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }

    /// Returns true when a valid session is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Returns true while the initial session check has not settled.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Checking)
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated { user } => Some(user),
            _ => None,
        }
    }

    /// Computes the next state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` when `transition` is not
    /// allowed from the current state.
    pub fn apply(&self, transition: AuthTransition) -> DomainResult<Self> {
        let event = transition.name();
        match (self, transition) {
            (Self::Uninitialized | Self::Unauthenticated, AuthTransition::StartCheck) => {
                Ok(Self::Checking)
            }
            (Self::Checking, AuthTransition::SessionValid(user))
            | (_, AuthTransition::SignedIn(user))
            | (Self::Authenticated { .. }, AuthTransition::ProfileRefreshed(user)) => {
                Ok(Self::Authenticated { user })
            }
            (Self::Checking | Self::Authenticated { .. }, AuthTransition::SessionInvalid)
            | (_, AuthTransition::SignedOut) => Ok(Self::Unauthenticated),
            (from, _) => Err(DomainError::InvalidTransition {
                from: from.name(),
                event,
            }),
        }
    }
}
