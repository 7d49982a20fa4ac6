//! Fakes shared by the unit tests of this crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chatdesk_domain::{
    Appeal, AppealPatch, AuthResponse, Chat, Credentials, Notification, Page, PageRequest,
    RefreshResponse, RegistrationData, SendMessage, Sender, ServerMessage, TokenPair, UserProfile,
};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::error::ApiError;
use crate::ports::{AuthApi, BackendApi, Clock, Navigator, Notifier};
use crate::session::{MemoryStorage, SessionStore};

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub fn advance_secs(&self, secs: i64) {
        *self.now.lock() += chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A signed-looking token expiring `secs` after the clock's current time.
pub fn token_expiring_in(clock: &ManualClock, secs: i64) -> String {
    let exp = clock.now().timestamp() + secs;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"sub":"1"}}"#));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn sample_user() -> UserProfile {
    UserProfile {
        id: 1,
        name: "Ann Operator".to_string(),
        email: "ops@example.com".to_string(),
        role: Some("operator".to_string()),
        company_id: Some(10),
        plan: None,
        subscription_expires_at: None,
    }
}

pub fn test_session() -> (Arc<SessionStore>, Arc<ManualClock>, Arc<MemoryStorage>) {
    let clock = Arc::new(ManualClock::default());
    let storage = Arc::new(MemoryStorage::new());
    let session = Arc::new(SessionStore::new(storage.clone(), clock.clone()));
    (session, clock, storage)
}

pub fn auth_response(clock: &ManualClock) -> AuthResponse {
    AuthResponse {
        access_token: token_expiring_in(clock, 3600),
        refresh_token: token_expiring_in(clock, 86_400),
        expires_in: Some(3600),
        user: sample_user(),
    }
}

pub fn server_message(id: i64, appeal_id: i64, text: &str) -> ServerMessage {
    ServerMessage {
        id,
        appeal_id,
        text: text.to_string(),
        sender: Sender::default(),
        created_at: None,
        correlation_id: None,
        message_type: None,
    }
}

/// Lets spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct FakeAuthApi {
    login: Option<Result<AuthResponse, ApiError>>,
    register_error: Option<ApiError>,
    refreshed: Option<TokenPair>,
    logout_error: Option<ApiError>,
    profile: Option<Result<UserProfile, ApiError>>,
    login_calls: AtomicUsize,
    register_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    me_calls: AtomicUsize,
}

impl FakeAuthApi {
    pub fn logging_in_with(mut self, response: AuthResponse) -> Self {
        self.login = Some(Ok(response));
        self
    }

    pub fn failing_login(mut self, error: ApiError) -> Self {
        self.login = Some(Err(error));
        self
    }

    pub fn failing_register(mut self, error: ApiError) -> Self {
        self.register_error = Some(error);
        self
    }

    pub fn refreshing_to(mut self, access: &str, refresh: &str) -> Self {
        self.refreshed = Some(TokenPair::new(access, refresh));
        self
    }

    pub fn failing_logout(mut self, error: ApiError) -> Self {
        self.logout_error = Some(error);
        self
    }

    pub fn with_profile(mut self, user: UserProfile) -> Self {
        self.profile = Some(Ok(user));
        self
    }

    pub fn failing_profile(mut self, error: ApiError) -> Self {
        self.profile = Some(Err(error));
        self
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn register_count(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn me_count(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn register(&self, _data: &RegistrationData) -> Result<(), ApiError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.register_error.clone().map_or(Ok(()), Err)
    }

    async fn login(&self, _credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login
            .clone()
            .unwrap_or_else(|| Err(ApiError::from_status(401, None)))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.refreshed
            .clone()
            .map(|tokens| RefreshResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_in: None,
            })
            .ok_or_else(|| ApiError::from_status(401, None))
    }

    async fn logout(&self, _access: &str, _refresh: Option<&str>) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_error.clone().map_or(Ok(()), Err)
    }

    async fn me(&self, _access_token: &str) -> Result<UserProfile, ApiError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.profile.clone().unwrap_or_else(|| Ok(sample_user()))
    }
}

#[derive(Default)]
pub struct FakeBackendApi {
    reply: Mutex<Option<Result<ServerMessage, ApiError>>>,
    history: Vec<ServerMessage>,
    appeals: Mutex<Vec<Appeal>>,
    sent: Mutex<Vec<SendMessage>>,
}

impl FakeBackendApi {
    pub fn replying_with(self, message: ServerMessage) -> Self {
        self.reply_with(message);
        self
    }

    pub fn failing_with(self, error: ApiError) -> Self {
        *self.reply.lock() = Some(Err(error));
        self
    }

    pub fn with_appeals(self, appeals: Vec<Appeal>) -> Self {
        *self.appeals.lock() = appeals;
        self
    }

    pub fn with_history(mut self, history: Vec<ServerMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn reply_with(&self, message: ServerMessage) {
        *self.reply.lock() = Some(Ok(message));
    }

    pub fn sent(&self) -> Vec<SendMessage> {
        self.sent.lock().clone()
    }
}

pub fn sample_appeal(id: i64, status: &str) -> Appeal {
    Appeal {
        id,
        company_id: Some(10),
        status: Some(status.to_string()),
        client_name: Some("Client".to_string()),
        channel: Some("telegram".to_string()),
        operator_id: None,
        is_bot_active: Some(true),
        unread_count: 0,
        last_message: None,
        updated_at: None,
    }
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    Page {
        results: items.to_vec(),
        total: items.len() as u64,
        limit: page.limit,
        offset: page.offset,
    }
}

#[async_trait]
impl BackendApi for FakeBackendApi {
    async fn list_appeals(
        &self,
        _access_token: &str,
        _company_id: Option<i64>,
        page: PageRequest,
    ) -> Result<Page<Appeal>, ApiError> {
        Ok(page_of(&self.appeals.lock(), page))
    }

    async fn get_appeal(&self, _access_token: &str, appeal_id: i64) -> Result<Appeal, ApiError> {
        self.appeals
            .lock()
            .iter()
            .find(|a| a.id == appeal_id)
            .cloned()
            .ok_or_else(|| ApiError::from_status(404, None))
    }

    async fn update_appeal(
        &self,
        _access_token: &str,
        appeal_id: i64,
        patch: &AppealPatch,
    ) -> Result<Appeal, ApiError> {
        let mut appeals = self.appeals.lock();
        let appeal = appeals
            .iter_mut()
            .find(|a| a.id == appeal_id)
            .ok_or_else(|| ApiError::from_status(404, None))?;
        appeal.merge(patch);
        Ok(appeal.clone())
    }

    async fn list_messages(
        &self,
        _access_token: &str,
        _appeal_id: i64,
        page: PageRequest,
    ) -> Result<Page<ServerMessage>, ApiError> {
        Ok(page_of(&self.history, page))
    }

    async fn send_message(
        &self,
        _access_token: &str,
        message: &SendMessage,
    ) -> Result<ServerMessage, ApiError> {
        self.sent.lock().push(message.clone());
        self.reply
            .lock()
            .clone()
            .unwrap_or_else(|| Err(ApiError::from_status(500, None)))
    }

    async fn get_chat(&self, _access_token: &str, chat_id: i64) -> Result<Chat, ApiError> {
        Err(ApiError::from_status(404, Some(format!("chat {chat_id} not found"))))
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.routes.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().push(route.to_string());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}
