//! Realtime connection types.
//!
//! This module provides the connection state machine, subscription topic,
//! reconnect policy and endpoint construction for the realtime channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DomainError, DomainResult};

/// Path of the CRM realtime endpoint on the backend host.
pub const REALTIME_PATH: &str = "/api/v1/ws/crm/";

/// Realtime connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection requested.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Connected and subscribed.
    Open,
    /// Dropped unexpectedly; a reconnect is scheduled.
    Closed,
    /// Reconnect attempts exhausted; waiting for a manual reconnect.
    Failed,
}

/// Inputs that move the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection attempt starts (explicit open or scheduled reconnect).
    Connect,
    /// Handshake completed.
    Handshake,
    /// Error or server-initiated close.
    Dropped,
    /// Reconnect policy gave up.
    GiveUp,
    /// Explicit teardown.
    Shutdown,
}

impl ConnectionState {
    /// Check if the connection is usable.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check if a connection is live or being established.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    /// Get a human-readable status string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Open => "Connected",
            Self::Closed => "Reconnecting...",
            Self::Failed => "Connection Failed",
        }
    }

    /// Computes the next state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` for transitions the channel
    /// never performs, such as a handshake while idle.
    pub fn transition(self, event: ConnectionEvent) -> DomainResult<Self> {
        match (self, event) {
            (Self::Idle | Self::Closed | Self::Failed, ConnectionEvent::Connect) => {
                Ok(Self::Connecting)
            }
            (Self::Connecting, ConnectionEvent::Handshake) => Ok(Self::Open),
            (Self::Connecting | Self::Open, ConnectionEvent::Dropped) => Ok(Self::Closed),
            (Self::Closed, ConnectionEvent::GiveUp) => Ok(Self::Failed),
            (_, ConnectionEvent::Shutdown) => Ok(Self::Idle),
            (from, event) => Err(DomainError::InvalidTransition {
                from: from.name(),
                event: event.name(),
            }),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl ConnectionEvent {
    const fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Handshake => "handshake",
            Self::Dropped => "dropped",
            Self::GiveUp => "give_up",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Event types a console subscribes to by default.
pub const DEFAULT_EVENT_TYPES: &[&str] = &["new_message", "appeal_update", "new_appeal", "typing"];

/// Tenant scope and event filter of a realtime subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    /// Tenant id.
    pub company_id: i64,
    /// Event types of interest.
    pub event_types: Vec<String>,
}

impl Topic {
    /// Topic with the default event types.
    #[must_use]
    pub fn company(company_id: i64) -> Self {
        Self {
            company_id,
            event_types: DEFAULT_EVENT_TYPES.iter().map(ToString::to_string).collect(),
        }
    }

    /// Replaces the event filter.
    #[must_use]
    pub fn with_event_types<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = event_types.into_iter().map(Into::into).collect();
        self
    }
}

/// Wire dialect for the subscribe directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeFormat {
    /// `{"cmd": "subscribe", "data": {...}}`
    #[default]
    Command,
    /// `{"type": "subscribe", "channel": {...}}`
    Typed,
}

/// Client-to-server control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Register interest in a topic.
    Subscribe(Topic),
    /// Any other JSON directive.
    Raw(serde_json::Value),
}

impl Directive {
    /// Encodes the directive as a JSON text frame.
    #[must_use]
    pub fn encode(&self, format: SubscribeFormat) -> String {
        let value = match self {
            Self::Subscribe(topic) => {
                let scope = serde_json::json!({
                    "company_id": topic.company_id,
                    "event_types": topic.event_types,
                });
                match format {
                    SubscribeFormat::Command => {
                        serde_json::json!({ "cmd": "subscribe", "data": scope })
                    }
                    SubscribeFormat::Typed => {
                        serde_json::json!({ "type": "subscribe", "channel": scope })
                    }
                }
            }
            Self::Raw(value) => value.clone(),
        };
        value.to_string()
    }
}

/// Reconnect delay policy: linear in the attempt number, capped, bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Attempts before giving up (0 for unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` once
    /// the policy has given up.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts != 0 && attempt > self.max_attempts {
            return None;
        }
        Some(self.base_delay.saturating_mul(attempt.max(1)).min(self.max_delay))
    }
}

/// Builds the realtime endpoint URL for `base` with the access token as a query parameter.
///
/// `base` may be an http(s) backend URL, whose scheme is mapped to ws(s) and
/// whose path is replaced with the CRM endpoint, or a ws(s) URL used as-is.
///
/// # Errors
///
/// Returns `DomainError::InvalidUrl` for unparsable URLs or unsupported schemes.
pub fn realtime_url(base: &str, access_token: &str) -> DomainResult<Url> {
    let mut url = Url::parse(base).map_err(|e| DomainError::InvalidUrl(format!("{base}: {e}")))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(DomainError::InvalidUrl(format!(
                "unsupported scheme for realtime endpoint: {other}"
            )));
        }
    };
    let is_http = url.scheme().starts_with("http");
    url.set_scheme(scheme)
        .map_err(|()| DomainError::InvalidUrl(format!("cannot use scheme {scheme} for {base}")))?;
    if is_http {
        url.set_path(REALTIME_PATH);
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("access_token", access_token);
    Ok(url)
}

/// Realtime connection diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionInfo {
    /// Connection state.
    pub state: ConnectionState,
    /// Subscribed topic.
    pub topic: Option<Topic>,
    /// Connected at timestamp.
    pub connected_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Number of frames sent.
    pub frames_sent: u64,
    /// Number of frames received.
    pub frames_received: u64,
    /// Number of frames dropped as malformed.
    pub frames_dropped: u64,
    /// Consecutive unplanned closes since the last stable connection.
    pub reconnect_attempts: u32,
}

impl ConnectionInfo {
    /// Mark as connected. The attempt counter is kept until the
    /// connection proves stable.
    pub fn connected(&mut self, at: chrono::DateTime<chrono::Utc>) {
        self.state = ConnectionState::Open;
        self.connected_at = Some(at);
    }

    /// Record a sent frame.
    pub const fn record_sent(&mut self) {
        self.frames_sent = self.frames_sent.saturating_add(1);
    }

    /// Record a received frame.
    pub const fn record_received(&mut self, decoded: bool) {
        self.frames_received = self.frames_received.saturating_add(1);
        if !decoded {
            self.frames_dropped = self.frames_dropped.saturating_add(1);
        }
    }
}
