//! Authentication domain types

mod state;
mod types;

pub use state::{AuthState, AuthTransition};
pub use types::{
    AuthResponse, CachedProfile, Credentials, RefreshResponse, RegistrationData, TokenClaims,
    TokenPair, UserProfile, token_preview,
};
