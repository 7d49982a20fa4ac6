//! Auth orchestrator: session state machine, auth flows and route guarding.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chatdesk_domain::{
    AuthState, AuthTransition, Credentials, RegistrationData, RouteDecision, RouteGuard,
    UserProfile,
};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::authorized::AuthorizedCalls;
use super::events::SessionEvent;
use crate::error::{AuthFailure, REGISTER_FALLBACK_MESSAGE};
use crate::ports::{AuthApi, Navigator};
use crate::session::SessionStore;

/// Interval of the background session check.
pub const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Cached profiles younger than this are used at startup without a `/me` call.
pub const PROFILE_CACHE_MAX_AGE_SECONDS: i64 = 5 * 60;

const EVENT_CAPACITY: usize = 32;

/// Single source of truth for whether this client is signed in.
pub struct AuthOrchestrator {
    session: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    calls: Arc<AuthorizedCalls>,
    navigator: Arc<dyn Navigator>,
    guard: RouteGuard,
    state: RwLock<AuthState>,
    events: broadcast::Sender<SessionEvent>,
    check_interval: Duration,
    profile_max_age: chrono::Duration,
}

impl std::fmt::Debug for AuthOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOrchestrator")
            .field("state", &self.state.read().name())
            .field("check_interval", &self.check_interval)
            .finish_non_exhaustive()
    }
}

impl AuthOrchestrator {
    /// Creates an orchestrator in the `uninitialized` state.
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        api: Arc<dyn AuthApi>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let calls = Arc::new(AuthorizedCalls::new(
            Arc::clone(&session),
            Arc::clone(&api),
            events.clone(),
        ));
        Self {
            session,
            api,
            calls,
            navigator,
            guard: RouteGuard::default(),
            state: RwLock::new(AuthState::default()),
            events,
            check_interval: SESSION_CHECK_INTERVAL,
            profile_max_age: chrono::Duration::seconds(PROFILE_CACHE_MAX_AGE_SECONDS),
        }
    }

    /// Replaces the route guard.
    #[must_use]
    pub fn with_guard(mut self, guard: RouteGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Overrides the background check interval.
    #[must_use]
    pub const fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    /// Returns true when signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    /// Profile of the signed-in user.
    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.read().user().cloned()
    }

    /// Executor for authenticated backend calls sharing this session's refresh lock.
    #[must_use]
    pub const fn authorized(&self) -> &Arc<AuthorizedCalls> {
        &self.calls
    }

    /// The session store.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The route guard.
    #[must_use]
    pub const fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    /// Subscribes to session lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn transition(&self, transition: AuthTransition) -> bool {
        let mut state = self.state.write();
        match state.apply(transition) {
            Ok(next) => {
                debug!(from = state.name(), to = next.name(), "auth state changed");
                *state = next;
                true
            }
            Err(e) => {
                warn!(error = %e, "ignored auth transition");
                false
            }
        }
    }

    /// Runs the startup session check and returns the settled state.
    ///
    /// A stored session with an unexpired refresh token is accepted. The
    /// cached profile is used when younger than five minutes, otherwise it is
    /// fetched; a failed fetch clears the session.
    pub async fn initialize(&self) -> AuthState {
        if !self.transition(AuthTransition::StartCheck) {
            return self.state();
        }

        if !self.session.has_valid_session() {
            debug!("no valid stored session");
            self.transition(AuthTransition::SessionInvalid);
            return self.state();
        }

        let fresh_cache = self
            .session
            .user_age()
            .is_some_and(|age| age < self.profile_max_age);
        let cached = if fresh_cache {
            self.session.get_user()
        } else {
            None
        };

        let user = match cached {
            Some(user) => {
                debug!(user_id = user.id, "using cached profile");
                Some(user)
            }
            None => self.fetch_profile().await,
        };

        match user {
            Some(user) => {
                info!(user_id = user.id, "session restored");
                self.transition(AuthTransition::SessionValid(user));
            }
            None => {
                self.session.clear_tokens();
                self.transition(AuthTransition::SessionInvalid);
            }
        }
        self.state()
    }

    async fn fetch_profile(&self) -> Option<UserProfile> {
        let api = &self.api;
        match self
            .calls
            .call(|token| async move { api.me(&token).await })
            .await
        {
            Ok(user) => {
                self.session.set_user(&user);
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch profile");
                None
            }
        }
    }

    /// Signs in, stores the session and navigates to the authenticated landing route.
    ///
    /// # Errors
    ///
    /// Returns an `AuthFailure` with the server message or a generic
    /// fallback. State is left unchanged.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, AuthFailure> {
        let response = self.api.login(credentials).await.map_err(|e| {
            warn!(error = %e, "login failed");
            AuthFailure::from_api(&e)
        })?;

        self.session.set_token_pair(&response.tokens());
        self.session.set_user(&response.user);
        let user = response.user;
        self.transition(AuthTransition::SignedIn(user.clone()));
        info!(user_id = user.id, "signed in");

        let _ = self.events.send(SessionEvent::LoggedIn {
            user_id: user.id,
            company_id: user.company_id,
        });
        self.navigator.navigate(self.guard.authenticated_route());
        Ok(user)
    }

    /// Creates an account, then signs in with the same credentials.
    ///
    /// # Errors
    ///
    /// Returns an `AuthFailure` if either step fails.
    pub async fn register(&self, data: &RegistrationData) -> Result<UserProfile, AuthFailure> {
        self.api.register(data).await.map_err(|e| {
            warn!(error = %e, "registration failed");
            AuthFailure::from_api_or(&e, REGISTER_FALLBACK_MESSAGE)
        })?;
        info!("account created");
        self.login(&data.credentials()).await
    }

    /// Signs out. A failing remote call is logged; local state is always cleared.
    pub async fn logout(&self) {
        if let Some(tokens) = self.session.tokens()
            && let Err(e) = self
                .api
                .logout(&tokens.access_token, Some(&tokens.refresh_token))
                .await
        {
            warn!(error = %e, "remote logout failed");
        }
        self.end_session(SessionEvent::LoggedOut);
        info!("signed out");
    }

    /// Re-fetches the profile. A failure signs the user out.
    pub async fn refresh_user(&self) -> Option<UserProfile> {
        let Some(user) = self.fetch_profile().await else {
            self.logout().await;
            return None;
        };
        self.transition(AuthTransition::ProfileRefreshed(user.clone()));
        let _ = self.events.send(SessionEvent::ProfileRefreshed);
        Some(user)
    }

    /// Decides navigation to `path`, performing the redirect if one is due.
    pub fn guard_route(&self, path: &str) -> RouteDecision {
        let decision = self.guard.check(&self.state.read(), path);
        if let Some(target) = decision.redirect_target() {
            debug!(from = path, to = target, "route redirected");
            self.navigator.navigate(target);
        }
        decision
    }

    /// Re-validates the session when the access token is close to expiry.
    ///
    /// Returns whether the client is still signed in.
    pub async fn check_session(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        if !self.session.has_valid_session() {
            self.expire_session();
            return false;
        }
        if !self.session.should_refresh_token() {
            return true;
        }
        debug!("access token close to expiry, refreshing");
        match self.calls.refresh_now().await {
            Ok(_) => true,
            Err(_) => {
                self.expire_session();
                false
            }
        }
    }

    /// Ends a session that became invalid without user action.
    ///
    /// Does nothing unless signed in.
    pub fn expire_session(&self) {
        if !self.is_authenticated() {
            return;
        }
        warn!("session expired");
        self.end_session(SessionEvent::Expired);
    }

    fn end_session(&self, event: SessionEvent) {
        self.session.clear_tokens();
        self.transition(AuthTransition::SignedOut);
        let _ = self.events.send(event);
        self.navigator.navigate(self.guard.login_route());
    }

    /// Starts the periodic session check and the refresh-failure watcher.
    ///
    /// The task stops once the orchestrator is dropped.
    pub fn spawn_background_check(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut events = self.events.subscribe();
        let period = self.check_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(this) = weak.upgrade() else { break };
                        this.check_session().await;
                    }
                    event = events.recv() => match event {
                        Ok(SessionEvent::RefreshFailed) => {
                            let Some(this) = weak.upgrade() else { break };
                            this.expire_session();
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "session event watcher lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!("background session check stopped");
        })
    }
}
