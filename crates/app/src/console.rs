//! Wiring of adapters and services for one console run.

use std::error::Error;
use std::sync::Arc;

use chatdesk_application::ports::{
    AuthApi, BackendApi, Clock, FrameHandler, KeyValueStorage, Navigator, Notifier,
};
use chatdesk_application::{
    AuthOrchestrator, ChannelConfig, DialogService, DialogStore, DialogSync, RealtimeChannel,
    SessionStore,
};
use chatdesk_domain::{Sender, UserProfile};
use chatdesk_infrastructure::{
    ConsoleConfig, ConsoleNavigator, FileStorage, JsonClient, ReqwestAuthApi, ReqwestBackendApi,
    SystemClock, TracingNotifier, TungsteniteTransport,
};
use tracing::debug;

/// Services shared by every command.
pub struct Console {
    pub config: ConsoleConfig,
    pub clock: Arc<dyn Clock>,
    pub session: Arc<SessionStore>,
    pub auth: Arc<AuthOrchestrator>,
    pub backend: Arc<dyn BackendApi>,
    pub notifier: Arc<dyn Notifier>,
}

impl Console {
    pub fn build(config: ConsoleConfig) -> Result<Self, Box<dyn Error>> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let storage = match &config.storage_path {
            Some(path) => FileStorage::open(path)?,
            None => FileStorage::open_default()?,
        };
        debug!(path = %storage.path().display(), "session storage");
        let storage: Arc<dyn KeyValueStorage> = Arc::new(storage);
        let session = Arc::new(SessionStore::new(storage, clock.clone()));

        let timeout = config.request_timeout();
        let auth_api: Arc<dyn AuthApi> =
            Arc::new(ReqwestAuthApi::new(JsonClient::new(&config.auth_base_url, timeout)?));
        let mut backend_http = JsonClient::new(&config.backend_base_url, timeout)?;
        if let Some(key) = &config.service_key {
            backend_http = backend_http.with_service_key(key.clone());
        }
        let backend: Arc<dyn BackendApi> = Arc::new(ReqwestBackendApi::new(backend_http));

        let navigator: Arc<dyn Navigator> = Arc::new(ConsoleNavigator::new());
        let auth = Arc::new(
            AuthOrchestrator::new(session.clone(), auth_api, navigator)
                .with_guard(config.route_guard()),
        );

        Ok(Self {
            config,
            clock,
            session,
            auth,
            backend,
            notifier: Arc::new(TracingNotifier),
        })
    }

    /// Restores the stored session, failing when nobody is signed in.
    pub async fn require_user(&self) -> Result<UserProfile, Box<dyn Error>> {
        self.auth.initialize().await;
        self.auth
            .current_user()
            .ok_or_else(|| "not signed in; run `chatdesk login` first".into())
    }

    pub fn dialog_store(&self) -> Arc<DialogStore> {
        Arc::new(DialogStore::new(self.clock.clone()))
    }

    pub fn dialogs(&self, user: &UserProfile, store: Arc<DialogStore>) -> DialogService {
        DialogService::new(
            self.backend.clone(),
            self.auth.authorized().clone(),
            store,
            self.notifier.clone(),
            Sender::operator(user.name.clone()),
        )
    }

    pub fn realtime(&self, store: Arc<DialogStore>) -> RealtimeChannel {
        let handler: Arc<dyn FrameHandler> = Arc::new(DialogSync::new(store, self.notifier.clone()));
        let config = ChannelConfig::new(self.config.realtime_endpoint())
            .with_policy(self.config.reconnect_policy())
            .with_format(self.config.subscribe_format);
        RealtimeChannel::new(
            config,
            Arc::new(TungsteniteTransport::default()),
            self.session.clone(),
            handler,
            self.notifier.clone(),
            self.clock.clone(),
        )
    }
}
