//! Shared wiring for the console integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chatdesk_application::ports::{AuthApi, BackendApi, Clock};
use chatdesk_application::{AuthOrchestrator, SessionStore};
use chatdesk_infrastructure::{
    ConsoleNavigator, FileStorage, JsonClient, ReqwestAuthApi, ReqwestBackendApi, SystemClock,
};
use serde_json::{Value, json};

/// A JWT-shaped token for `subject` expiring `secs` from now.
pub fn token(subject: &str, secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + secs;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"sub":"{subject}"}}"#));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn user_json() -> Value {
    json!({
        "id": 1,
        "name": "Ann Operator",
        "email": "ops@example.com",
        "role": "operator",
        "company_id": 10,
    })
}

pub struct Harness {
    pub session: Arc<SessionStore>,
    pub auth: Arc<AuthOrchestrator>,
    pub navigator: Arc<ConsoleNavigator>,
    pub backend: Arc<dyn BackendApi>,
    pub clock: Arc<dyn Clock>,
}

/// Real adapters against `base_url`, storing the session in `storage_path`.
pub fn harness(base_url: &str, storage_path: &Path) -> Harness {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let storage = Arc::new(FileStorage::open(storage_path).unwrap());
    let session = Arc::new(SessionStore::new(storage, clock.clone()));
    let http = JsonClient::new(base_url, Duration::from_secs(5)).unwrap();
    let auth_api: Arc<dyn AuthApi> = Arc::new(ReqwestAuthApi::new(http.clone()));
    let backend: Arc<dyn BackendApi> = Arc::new(ReqwestBackendApi::new(http));
    let navigator = Arc::new(ConsoleNavigator::new());
    let auth = Arc::new(AuthOrchestrator::new(
        session.clone(),
        auth_api,
        navigator.clone(),
    ));
    Harness {
        session,
        auth,
        navigator,
        backend,
        clock,
    }
}
