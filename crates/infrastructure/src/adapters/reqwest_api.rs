//! REST adapters for the auth and backend services using reqwest.
//!
//! Both services speak JSON over HTTPS. Non-success responses are turned
//! into [`ApiError`] using the status code and the first usable message
//! found in the body's `detail`, `message` or `error` field.

use std::time::Duration;

use async_trait::async_trait;
use chatdesk_application::ApiError;
use chatdesk_application::ports::{AuthApi, BackendApi};
use chatdesk_domain::{
    Appeal, AppealPatch, AuthResponse, Chat, Credentials, Page, PageRequest, RefreshResponse,
    RegistrationData, SendMessage, ServerMessage, UserProfile,
};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("chatdesk/", env!("CARGO_PKG_VERSION"));

/// Header carrying the backend service key.
pub const SERVICE_KEY_HEADER: &str = "x-authorization";

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors building an API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// The base URL cannot be parsed or is not http(s).
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The underlying HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// JSON client bound to one service base URL.
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: Client,
    base: Url,
    service_key: Option<String>,
}

impl JsonClient {
    /// Creates a client for `base_url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute http(s) URL or the
    /// client cannot be created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Self::with_client(client, base_url)
    }

    /// Creates a client from a preconfigured reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute http(s) URL.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ClientBuildError> {
        let invalid = |reason: String| ClientBuildError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let mut base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", base.scheme())));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            service_key: None,
        })
    }

    /// Sends `key` in the `x-authorization` header on every request.
    #[must_use]
    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    /// Base URL, always ending in `/`.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str, query: Option<String>) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| ApiError::Network(format!("invalid endpoint {path}: {e}")))?;
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.set_query(Some(&query));
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<String>,
        access_token: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path, query)?;
        let mut builder = self.client.request(method, url);
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(key) = &self.service_key {
            builder = builder.header(SERVICE_KEY_HEADER, key);
        }
        Ok(builder)
    }

    /// Sends the request and returns the raw body of a successful response.
    async fn execute(&self, builder: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.bytes().await.map_err(map_error)?;
        debug!(path = %url, status = status.as_u16(), bytes = body.len(), "response received");

        if status.is_success() {
            return Ok(body.to_vec());
        }
        let message = error_message(&body);
        if status.is_server_error() {
            warn!(path = %url, status = status.as_u16(), "server error");
        }
        Err(ApiError::from_status(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let body = self.execute(builder).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.execute(builder).await.map(|_| ())
    }
}

/// Maps reqwest errors to [`ApiError`].
fn map_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        return ApiError::Network("request timed out".to_string());
    }
    if error.is_decode() {
        return ApiError::Decode(error.to_string());
    }
    ApiError::Network(error.to_string())
}

/// Extracts a user-facing message from an error body.
///
/// `detail` may be a string or a list of validation entries with `msg`.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let text = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    };

    if let Some(detail) = value.get("detail") {
        if let Some(message) = text(detail) {
            return Some(message);
        }
        if let Some(entries) = detail.as_array() {
            let messages: Vec<String> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(text))
                .collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
    }
    ["message", "error"]
        .iter()
        .find_map(|field| value.get(*field).and_then(text))
}

fn encode_query<T: Serialize>(query: &T) -> Result<String, ApiError> {
    serde_urlencoded::to_string(query).map_err(|e| ApiError::Decode(e.to_string()))
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct LogoutBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Serialize)]
struct AppealQuery {
    limit: u32,
    offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_id: Option<i64>,
}

#[derive(Serialize)]
struct MessageQuery {
    appeal_id: i64,
    limit: u32,
    offset: u32,
}

/// [`AuthApi`] over the `/api/v1/auth/*` endpoints.
#[derive(Debug, Clone)]
pub struct ReqwestAuthApi {
    http: JsonClient,
}

impl ReqwestAuthApi {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(http: JsonClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AuthApi for ReqwestAuthApi {
    async fn register(&self, data: &RegistrationData) -> Result<(), ApiError> {
        let request = self
            .http
            .request(Method::POST, "api/v1/auth/register", None, None)?
            .json(data);
        self.http.send_empty(request).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let request = self
            .http
            .request(Method::POST, "api/v1/auth/login", None, None)?
            .json(credentials);
        self.http.send_json(request).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let request = self
            .http
            .request(Method::POST, "api/v1/auth/refresh", None, None)?
            .json(&RefreshBody { refresh_token });
        self.http.send_json(request).await
    }

    async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), ApiError> {
        let request = self
            .http
            .request(Method::POST, "api/v1/auth/logout", None, Some(access_token))?
            .json(&LogoutBody { refresh_token });
        self.http.send_empty(request).await
    }

    async fn me(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let request = self
            .http
            .request(Method::GET, "api/v1/auth/me", None, Some(access_token))?;
        self.http.send_json(request).await
    }
}

/// [`BackendApi`] over the appeal, message and chat endpoints.
#[derive(Debug, Clone)]
pub struct ReqwestBackendApi {
    http: JsonClient,
}

impl ReqwestBackendApi {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(http: JsonClient) -> Self {
        Self { http }
    }
}

/// Stamps the requested window onto a page so pagination can continue.
fn with_request<T>(mut page: Page<T>, request: PageRequest) -> Page<T> {
    page.limit = request.limit;
    page.offset = request.offset;
    page
}

#[async_trait]
impl BackendApi for ReqwestBackendApi {
    async fn list_appeals(
        &self,
        access_token: &str,
        company_id: Option<i64>,
        page: PageRequest,
    ) -> Result<Page<Appeal>, ApiError> {
        let query = encode_query(&AppealQuery {
            limit: page.limit,
            offset: page.offset,
            company_id,
        })?;
        let request =
            self.http
                .request(Method::GET, "api/v1/appeals/", Some(query), Some(access_token))?;
        self.http
            .send_json(request)
            .await
            .map(|result| with_request(result, page))
    }

    async fn get_appeal(&self, access_token: &str, appeal_id: i64) -> Result<Appeal, ApiError> {
        let path = format!("api/v1/appeals/{appeal_id}/");
        let request = self
            .http
            .request(Method::GET, &path, None, Some(access_token))?;
        self.http.send_json(request).await
    }

    async fn update_appeal(
        &self,
        access_token: &str,
        appeal_id: i64,
        patch: &AppealPatch,
    ) -> Result<Appeal, ApiError> {
        let path = format!("api/v1/appeals/{appeal_id}/");
        let request = self
            .http
            .request(Method::PATCH, &path, None, Some(access_token))?
            .json(patch);
        self.http.send_json(request).await
    }

    async fn list_messages(
        &self,
        access_token: &str,
        appeal_id: i64,
        page: PageRequest,
    ) -> Result<Page<ServerMessage>, ApiError> {
        let query = encode_query(&MessageQuery {
            appeal_id,
            limit: page.limit,
            offset: page.offset,
        })?;
        let request =
            self.http
                .request(Method::GET, "api/v1/messages/", Some(query), Some(access_token))?;
        self.http
            .send_json(request)
            .await
            .map(|result| with_request(result, page))
    }

    async fn send_message(
        &self,
        access_token: &str,
        message: &SendMessage,
    ) -> Result<ServerMessage, ApiError> {
        let request = self
            .http
            .request(Method::POST, "api/v1/messages/", None, Some(access_token))?
            .json(message);
        self.http.send_json(request).await
    }

    async fn get_chat(&self, access_token: &str, chat_id: i64) -> Result<Chat, ApiError> {
        let path = format!("api/v1/chats/{chat_id}/");
        let request = self
            .http
            .request(Method::GET, &path, None, Some(access_token))?;
        self.http.send_json(request).await
    }
}
