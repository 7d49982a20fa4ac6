//! Remote auth endpoint port

use async_trait::async_trait;
use chatdesk_domain::{AuthResponse, Credentials, RefreshResponse, RegistrationData, UserProfile};

use crate::error::ApiError;

/// Port for the `/api/v1/auth/*` endpoint family.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Creates an account. Does not establish a session.
    async fn register(&self, data: &RegistrationData) -> Result<(), ApiError>;

    /// Exchanges credentials for a token pair and the user profile.
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    /// Exchanges a refresh token for a fresh token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError>;

    /// Invalidates the session on the server.
    async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), ApiError>;

    /// Fetches the profile of the token's owner.
    async fn me(&self, access_token: &str) -> Result<UserProfile, ApiError>;
}
