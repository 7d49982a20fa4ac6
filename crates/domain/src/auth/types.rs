//! Session credential and profile types

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Access and refresh token, always stored and replaced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived token sent as `Authorization: Bearer`.
    pub access_token: String,
    /// Longer-lived token exchanged for a fresh pair.
    pub refresh_token: String,
}

impl TokenPair {
    /// Creates a token pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Get a preview of a token (first 8 chars + ...), safe for logs.
#[must_use]
pub fn token_preview(token: &str) -> String {
    if token.len() > 12 && token.is_char_boundary(8) {
        format!("{}...", &token[..8])
    } else {
        "***".to_string()
    }
}

/// Claims read from a token payload.
///
/// Tokens are never verified on the client; only the expiry and subject
/// are inspected to drive refresh decisions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Expiry as a Unix timestamp in seconds.
    pub exp: i64,
    /// Subject claim, either a string or a numeric user id.
    #[serde(default)]
    pub sub: Option<serde_json::Value>,
}

impl TokenClaims {
    /// Decodes the payload segment of a `header.payload.signature` token.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedToken` if the token does not have three
    /// segments, the payload is not base64url, or it lacks a numeric `exp`.
    pub fn decode(token: &str) -> DomainResult<Self> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(DomainError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| DomainError::MalformedToken(format!("payload is not base64url: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| DomainError::MalformedToken(format!("unreadable claims: {e}")))
    }

    /// Expiry as a timestamp, if representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Returns true if the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|exp| now >= exp)
    }

    /// Remaining lifetime at `now`, negative once expired.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires_at()
            .map_or(chrono::Duration::zero(), |exp| exp - now)
    }

    /// Subject rendered as a string.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        match self.sub.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Cached profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Login email.
    pub email: String,
    /// Role within the tenant (owner, admin, operator...).
    #[serde(default)]
    pub role: Option<String>,
    /// Tenant the user belongs to.
    #[serde(default)]
    pub company_id: Option<i64>,
    /// Subscription plan name.
    #[serde(default)]
    pub plan: Option<String>,
    /// When the current subscription ends.
    #[serde(default)]
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

/// A profile together with the time it was written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProfile {
    /// The profile.
    pub profile: UserProfile,
    /// When it was cached.
    pub cached_at: DateTime<Utc>,
}

/// Login form payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login email.
    pub email: String,
    /// Plain password, sent once over TLS.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Registration form payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationData {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Chosen password.
    pub password: String,
    /// Name of the tenant to create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// Contact phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl RegistrationData {
    /// Credentials to sign in with once the account exists.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.clone(), self.password.clone())
    }
}

/// Body returned by the login and register endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Fresh access token.
    pub access_token: String,
    /// Fresh refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Profile of the signed-in user.
    pub user: UserProfile,
}

impl AuthResponse {
    /// The token pair carried by this response.
    #[must_use]
    pub fn tokens(&self) -> TokenPair {
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// Fresh access token.
    pub access_token: String,
    /// Fresh refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl RefreshResponse {
    /// The token pair carried by this response.
    #[must_use]
    pub fn tokens(&self) -> TokenPair {
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}
