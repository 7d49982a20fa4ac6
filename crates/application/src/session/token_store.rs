//! Session token store with expiry introspection.
//!
//! Holds the access/refresh token pair and the cached user profile in
//! persistent key/value storage. Every operation degrades to an absent
//! result or a no-op when storage is missing or its content is unreadable.

use std::sync::Arc;

use chatdesk_domain::{CachedProfile, TokenClaims, TokenPair, UserProfile};
use tracing::{debug, warn};

use crate::ports::{AccessTokenSource, Clock, KeyValueStorage};

/// Storage key of the token pair.
pub const TOKENS_KEY: &str = "chatdesk.session.tokens";

/// Storage key of the cached profile.
pub const USER_KEY: &str = "chatdesk.session.user";

/// Remaining access token lifetime below which a refresh is due.
pub const REFRESH_THRESHOLD_SECONDS: i64 = 5 * 60;

/// Token and profile store for one client.
pub struct SessionStore {
    storage: Option<Arc<dyn KeyValueStorage>>,
    clock: Arc<dyn Clock>,
    refresh_threshold: chrono::Duration,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("attached", &self.storage.is_some())
            .field("refresh_threshold", &self.refresh_threshold)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: Some(storage),
            clock,
            refresh_threshold: chrono::Duration::seconds(REFRESH_THRESHOLD_SECONDS),
        }
    }

    /// Create a store with no storage behind it: reads are absent, writes are dropped.
    #[must_use]
    pub fn detached(clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: None,
            clock,
            refresh_threshold: chrono::Duration::seconds(REFRESH_THRESHOLD_SECONDS),
        }
    }

    /// Create with custom refresh threshold.
    #[must_use]
    pub fn with_refresh_threshold(mut self, seconds: i64) -> Self {
        self.refresh_threshold = chrono::Duration::seconds(seconds);
        self
    }

    /// Replaces both tokens in a single write.
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) {
        self.set_token_pair(&TokenPair::new(access_token, refresh_token));
    }

    /// Replaces both tokens in a single write.
    pub fn set_token_pair(&self, tokens: &TokenPair) {
        let Some(storage) = &self.storage else {
            return;
        };
        match serde_json::to_string(tokens) {
            Ok(encoded) => storage.set(TOKENS_KEY, &encoded),
            Err(e) => warn!(error = %e, "failed to encode token pair"),
        }
    }

    /// The stored token pair, or `None` if absent or unreadable.
    #[must_use]
    pub fn tokens(&self) -> Option<TokenPair> {
        let raw = self.storage.as_ref()?.get(TOKENS_KEY)?;
        serde_json::from_str(&raw)
            .inspect_err(|e| debug!(error = %e, "stored token pair is unreadable"))
            .ok()
    }

    /// The stored access token.
    #[must_use]
    pub fn get_access_token(&self) -> Option<String> {
        self.tokens().map(|t| t.access_token)
    }

    /// The stored refresh token.
    #[must_use]
    pub fn get_refresh_token(&self) -> Option<String> {
        self.tokens().map(|t| t.refresh_token)
    }

    /// Removes both tokens and the cached profile. Idempotent.
    pub fn clear_tokens(&self) {
        if let Some(storage) = &self.storage {
            storage.remove(TOKENS_KEY);
            storage.remove(USER_KEY);
        }
    }

    /// Caches `profile`, replacing any previous one.
    pub fn set_user(&self, profile: &UserProfile) {
        let Some(storage) = &self.storage else {
            return;
        };
        let cached = CachedProfile {
            profile: profile.clone(),
            cached_at: self.clock.now(),
        };
        match serde_json::to_string(&cached) {
            Ok(encoded) => storage.set(USER_KEY, &encoded),
            Err(e) => warn!(error = %e, "failed to encode user profile"),
        }
    }

    /// The cached profile with its cache time.
    #[must_use]
    pub fn cached_user(&self) -> Option<CachedProfile> {
        let raw = self.storage.as_ref()?.get(USER_KEY)?;
        serde_json::from_str(&raw)
            .inspect_err(|e| debug!(error = %e, "cached user profile is unreadable"))
            .ok()
    }

    /// The cached profile.
    #[must_use]
    pub fn get_user(&self) -> Option<UserProfile> {
        self.cached_user().map(|c| c.profile)
    }

    /// How long ago the profile was cached.
    #[must_use]
    pub fn user_age(&self) -> Option<chrono::Duration> {
        self.cached_user().map(|c| self.clock.since(c.cached_at))
    }

    /// Returns true if `token` is expired or cannot be decoded.
    #[must_use]
    pub fn is_token_expired(&self, token: &str) -> bool {
        TokenClaims::decode(token).map_or(true, |claims| claims.is_expired_at(self.clock.now()))
    }

    /// Returns true if an unexpired access token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.get_access_token()
            .is_some_and(|token| !self.is_token_expired(&token))
    }

    /// Returns true if both tokens are stored and the refresh token is unexpired.
    ///
    /// An expired refresh token clears the session as a side effect.
    #[must_use]
    pub fn has_valid_session(&self) -> bool {
        let Some(tokens) = self.tokens() else {
            return false;
        };
        if self.is_token_expired(&tokens.refresh_token) {
            debug!("refresh token expired, clearing session");
            self.clear_tokens();
            return false;
        }
        true
    }

    /// Returns true if the access token expires within the refresh threshold.
    ///
    /// An undecodable access token counts as due for refresh.
    #[must_use]
    pub fn should_refresh_token(&self) -> bool {
        let Some(token) = self.get_access_token() else {
            return false;
        };
        TokenClaims::decode(&token).map_or(true, |claims| {
            claims.remaining_at(self.clock.now()) < self.refresh_threshold
        })
    }

    /// Get token status for display.
    #[must_use]
    pub fn token_status(&self) -> TokenStatus {
        let Some(tokens) = self.tokens() else {
            return TokenStatus::NotAuthenticated;
        };
        let can_refresh = !self.is_token_expired(&tokens.refresh_token);
        let Ok(claims) = TokenClaims::decode(&tokens.access_token) else {
            return TokenStatus::Expired { can_refresh };
        };
        let remaining = claims.remaining_at(self.clock.now());
        if remaining <= chrono::Duration::zero() {
            TokenStatus::Expired { can_refresh }
        } else if remaining < self.refresh_threshold {
            TokenStatus::Expiring {
                seconds_remaining: remaining.num_seconds(),
                can_refresh,
            }
        } else {
            TokenStatus::Valid {
                seconds_remaining: remaining.num_seconds(),
            }
        }
    }
}

impl AccessTokenSource for SessionStore {
    fn access_token(&self) -> Option<String> {
        self.get_access_token()
            .filter(|token| !self.is_token_expired(token))
    }
}

/// Status of the stored access token for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// No session is stored.
    NotAuthenticated,
    /// Token is valid and not expiring soon.
    Valid {
        /// Seconds until expiry.
        seconds_remaining: i64,
    },
    /// Token is valid but will expire soon.
    Expiring {
        /// Seconds until expiry.
        seconds_remaining: i64,
        /// Whether the refresh token is still usable.
        can_refresh: bool,
    },
    /// Token has expired.
    Expired {
        /// Whether the refresh token is still usable.
        can_refresh: bool,
    },
}

impl TokenStatus {
    /// Returns true if the token is valid (not expired).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. } | Self::Expiring { .. })
    }

    /// Returns true if the token needs attention (expiring or expired).
    #[must_use]
    pub const fn needs_attention(&self) -> bool {
        matches!(self, Self::Expiring { .. } | Self::Expired { .. })
    }

    /// Get a user-friendly display message.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Not signed in".to_string(),
            Self::Valid { seconds_remaining } => {
                let secs = *seconds_remaining;
                if secs > 3600 {
                    format!("Valid for {} hours", secs / 3600)
                } else if secs > 60 {
                    format!("Valid for {} minutes", secs / 60)
                } else {
                    format!("Valid for {secs} seconds")
                }
            }
            Self::Expiring {
                seconds_remaining,
                can_refresh,
            } => {
                let refresh_hint = if *can_refresh {
                    " (will auto-refresh)"
                } else {
                    ""
                };
                format!("Expiring in {seconds_remaining} seconds{refresh_hint}")
            }
            Self::Expired { can_refresh } => {
                if *can_refresh {
                    "Expired (can refresh)".to_string()
                } else {
                    "Expired".to_string()
                }
            }
        }
    }
}
