//! Authenticated calls with single-flight token refresh.
//!
//! A call rejected with 401 triggers one refresh of the token pair and a
//! single retry. Concurrent rejections share the same refresh: callers
//! queue on a lock, and a caller that finds the stored token already
//! changed since its rejection reuses it instead of refreshing again.

use std::future::Future;
use std::sync::Arc;

use chatdesk_domain::auth::token_preview;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::events::SessionEvent;
use crate::error::ApiError;
use crate::ports::AuthApi;
use crate::session::SessionStore;

/// Executes backend calls with the stored access token.
pub struct AuthorizedCalls {
    session: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl AuthorizedCalls {
    /// Creates the executor. Session-ending refresh failures are reported on `events`.
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        api: Arc<dyn AuthApi>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            api,
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    /// The session store calls read tokens from.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Runs `request` with the current access token, refreshing and retrying once on 401.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if no session is stored or the refresh
    /// fails, otherwise the error of the last attempt.
    pub async fn call<T, F, Fut>(&self, request: F) -> Result<T, ApiError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let Some(token) = self.session.get_access_token() else {
            return Err(ApiError::Unauthorized { message: None });
        };

        match request(token.clone()).await {
            Err(e) if e.is_unauthorized() => {
                debug!(token = %token_preview(&token), "access token rejected");
                let fresh = self.refresh_after(&token).await?;
                request(fresh).await
            }
            other => other,
        }
    }

    /// Refreshes the token pair unless it already changed since `rejected` was issued.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` when the refresh fails; the session
    /// is cleared and `SessionEvent::RefreshFailed` is broadcast.
    pub async fn refresh_after(&self, rejected: &str) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.session.get_access_token()
            && current != rejected
        {
            debug!("token already refreshed by a concurrent call");
            return Ok(current);
        }
        self.refresh_locked().await
    }

    /// Refreshes the token pair now, waiting for any refresh in flight.
    ///
    /// # Errors
    ///
    /// Same as [`Self::refresh_after`].
    pub async fn refresh_now(&self) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<String, ApiError> {
        let Some(refresh_token) = self.session.get_refresh_token() else {
            return Err(self.fail_refresh("no refresh token stored"));
        };

        match self.api.refresh(&refresh_token).await {
            Ok(response) => {
                let tokens = response.tokens();
                self.session.set_token_pair(&tokens);
                let token_preview = token_preview(&tokens.access_token);
                info!(token = %token_preview, "tokens refreshed");
                let _ = self.events.send(SessionEvent::TokensRefreshed { token_preview });
                Ok(tokens.access_token)
            }
            Err(e) => Err(self.fail_refresh(&e.to_string())),
        }
    }

    fn fail_refresh(&self, reason: &str) -> ApiError {
        warn!(reason, "token refresh failed, clearing session");
        self.session.clear_tokens();
        let _ = self.events.send(SessionEvent::RefreshFailed);
        ApiError::Unauthorized { message: None }
    }
}
