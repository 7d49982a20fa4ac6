//! Console configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. An optional TOML file (`chatdesk.toml` by default)
//! 3. `CHATDESK_*` environment variables, nested keys separated by `__`
//!    (`CHATDESK_RECONNECT__MAX_ATTEMPTS=5`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatdesk_domain::websocket::DEFAULT_EVENT_TYPES;
use chatdesk_domain::{ReconnectPolicy, RouteGuard, SubscribeFormat, Topic};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use url::Url;

/// File read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "chatdesk.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "CHATDESK";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Reconnect tuning, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Delay before the first reconnect.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
    /// Attempts before giving up (0 for unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            base_delay_ms: u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX),
            max_delay_ms: u64::try_from(policy.max_delay.as_millis()).unwrap_or(u64::MAX),
            max_attempts: policy.max_attempts,
        }
    }
}

/// Settings for the chatdesk console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the auth service.
    pub auth_base_url: String,
    /// Base URL of the backend service.
    pub backend_base_url: String,
    /// Realtime endpoint; derived from `backend_base_url` when unset.
    pub websocket_url: Option<String>,
    /// Service key sent as `x-authorization` to the backend.
    pub service_key: Option<String>,
    /// Session file; defaults to the platform config directory.
    pub storage_path: Option<PathBuf>,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Subscribe directive dialect.
    pub subscribe_format: SubscribeFormat,
    /// Realtime event types to subscribe to.
    pub event_types: Vec<String>,
    /// Routes reachable without a session, in addition to the built-in ones.
    pub public_routes: Vec<String>,
    /// Reconnect tuning.
    pub reconnect: ReconnectSettings,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            auth_base_url: "http://localhost:8000".to_string(),
            backend_base_url: "http://localhost:8000".to_string(),
            websocket_url: None,
            service_key: None,
            storage_path: None,
            request_timeout_secs: 30,
            subscribe_format: SubscribeFormat::default(),
            event_types: DEFAULT_EVENT_TYPES.iter().map(ToString::to_string).collect(),
            public_routes: Vec::new(),
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl ConsoleConfig {
    /// Loads from `file` (or `chatdesk.toml` if present) and the process
    /// environment, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file is missing, a source
    /// cannot be parsed, or a value is invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(file, None)
    }

    /// Like [`ConsoleConfig::load`], reading variables from `env` instead of
    /// the process environment when given.
    ///
    /// # Errors
    ///
    /// See [`ConsoleConfig::load`].
    pub fn load_with_env(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };
        let env_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("event_types")
            .with_list_parse_key("public_routes")
            .try_parsing(true)
            .source(env);

        let config: Self = Config::builder()
            .add_source(file_source)
            .add_source(env_source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks URLs, timeouts and reconnect delays.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("auth_base_url", &self.auth_base_url, &["http", "https"])?;
        check_url("backend_base_url", &self.backend_base_url, &["http", "https"])?;
        if let Some(url) = &self.websocket_url {
            check_url("websocket_url", url, &["ws", "wss", "http", "https"])?;
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be positive"));
        }
        if let Some(route) = self.public_routes.iter().find(|r| !r.starts_with('/')) {
            return Err(invalid("public_routes", format!("'{route}' must start with '/'")));
        }
        if self.event_types.is_empty() {
            return Err(invalid("event_types", "at least one event type is required"));
        }
        let reconnect = &self.reconnect;
        if reconnect.base_delay_ms == 0 {
            return Err(invalid("reconnect.base_delay_ms", "must be positive"));
        }
        if reconnect.max_delay_ms < reconnect.base_delay_ms {
            return Err(invalid(
                "reconnect.max_delay_ms",
                "must not be smaller than reconnect.base_delay_ms",
            ));
        }
        Ok(())
    }

    /// HTTP request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reconnect policy for the realtime channel.
    #[must_use]
    pub const fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    /// Endpoint the realtime channel connects to.
    #[must_use]
    pub fn realtime_endpoint(&self) -> &str {
        self.websocket_url
            .as_deref()
            .unwrap_or(&self.backend_base_url)
    }

    /// Route guard with the configured public routes added.
    #[must_use]
    pub fn route_guard(&self) -> RouteGuard {
        self.public_routes
            .iter()
            .fold(RouteGuard::new(), |guard, route| guard.with_public_route(route.clone()))
    }

    /// Subscription topic for `company_id` with the configured event types.
    #[must_use]
    pub fn topic(&self, company_id: i64) -> Topic {
        Topic::company(company_id).with_event_types(self.event_types.iter().cloned())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_url(field: &'static str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid(field, format!("{value}: {e}")))?;
    if schemes.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("unsupported scheme '{}', expected one of {schemes:?}", url.scheme()),
        ))
    }
}
