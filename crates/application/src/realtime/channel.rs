//! Realtime messaging channel with automatic reconnect.
//!
//! The channel holds at most one live connection and at most one pending
//! reconnect. Every connection attempt gets a new generation number;
//! results from a connection that has since been torn down are discarded.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chatdesk_domain::{
    ConnectionEvent, ConnectionInfo, ConnectionState, Directive, InboundEvent, Notification,
    NotificationKind, NotificationLevel, ReconnectPolicy, SubscribeFormat, Topic, realtime_url,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::SessionEvent;
use crate::error::ChannelError;
use crate::ports::{AccessTokenSource, Clock, FrameHandler, Notifier, RealtimeTransport, TransportEvent};

/// Uptime after which a connection counts as stable and the reconnect
/// attempt counter starts over on its next drop.
pub const STABLE_CONNECTION: Duration = Duration::from_secs(5);

/// Message shown when reconnect attempts are exhausted.
pub const CONNECTION_LOST_MESSAGE: &str =
    "Live updates are unavailable. Reconnect to resume them.";

/// Endpoint and retry settings of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Backend base URL (http/https) or an explicit websocket URL.
    pub endpoint: String,
    /// Reconnect delay policy.
    pub policy: ReconnectPolicy,
    /// Wire dialect of the subscribe directive.
    pub format: SubscribeFormat,
}

impl ChannelConfig {
    /// Default settings for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            policy: ReconnectPolicy::default(),
            format: SubscribeFormat::default(),
        }
    }

    /// Set the reconnect policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the subscribe dialect.
    #[must_use]
    pub const fn with_format(mut self, format: SubscribeFormat) -> Self {
        self.format = format;
        self
    }
}

/// A duplex connection scoped to one tenant topic.
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

struct Inner {
    config: ChannelConfig,
    transport: Arc<dyn RealtimeTransport>,
    tokens: Arc<dyn AccessTokenSource>,
    handler: Arc<dyn FrameHandler>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    state: Mutex<ChannelState>,
}

#[derive(Default)]
struct ChannelState {
    info: ConnectionInfo,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    pending_delay: Option<Duration>,
    opened_at: Option<Instant>,
}

impl ChannelState {
    fn apply(&mut self, event: ConnectionEvent) -> bool {
        match self.info.state.transition(event) {
            Ok(next) => {
                self.info.state = next;
                true
            }
            Err(e) => {
                debug!(error = %e, "ignored connection event");
                false
            }
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(handle) = self.reconnect.take() {
            handle.abort();
        }
        self.pending_delay = None;
    }

    fn teardown(&mut self) {
        self.generation += 1;
        self.cancel_reconnect();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.outbound = None;
        self.apply(ConnectionEvent::Shutdown);
        self.info.reconnect_attempts = 0;
        self.info.connected_at = None;
        self.opened_at = None;
    }
}

enum DropOutcome {
    Scheduled,
    GaveUp,
}

impl RealtimeChannel {
    /// Creates an idle channel.
    #[must_use]
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn RealtimeTransport>,
        tokens: Arc<dyn AccessTokenSource>,
        handler: Arc<dyn FrameHandler>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                tokens,
                handler,
                notifier,
                clock,
                state: Mutex::new(ChannelState::default()),
            }),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().info.state
    }

    /// Connection diagnostics.
    #[must_use]
    pub fn info(&self) -> ConnectionInfo {
        self.inner.state.lock().info.clone()
    }

    /// Delay of the scheduled reconnect, if one is pending.
    #[must_use]
    pub fn pending_reconnect_delay(&self) -> Option<Duration> {
        self.inner.state.lock().pending_delay
    }

    /// Connects and subscribes to `topic`.
    ///
    /// Does nothing without a valid access token, or when a connection to
    /// the same topic is already open or being established. A connection to
    /// a different topic is closed first. Failures are handled by the
    /// reconnect scheduler.
    pub async fn open(&self, topic: Topic) {
        if self.inner.tokens.access_token().is_none() {
            debug!("no valid access token, realtime open skipped");
            return;
        }
        {
            let mut st = self.inner.state.lock();
            if st.info.state.is_active() && st.info.topic.as_ref() == Some(&topic) {
                debug!(company_id = topic.company_id, "realtime channel already open");
                return;
            }
            if st.info.state != ConnectionState::Idle {
                debug!("switching realtime topic");
                st.teardown();
            }
            st.info.topic = Some(topic);
        }
        self.inner.connect().await;
    }

    /// Closes the connection and cancels any pending reconnect.
    pub fn close(&self) {
        self.inner.shutdown();
    }

    /// Sends a directive on the open connection.
    ///
    /// Directives are not buffered across reconnects.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::NotOpen` unless the channel is open.
    pub fn send(&self, directive: &Directive) -> Result<(), ChannelError> {
        let mut st = self.inner.state.lock();
        if !st.info.state.is_open() {
            return Err(ChannelError::NotOpen);
        }
        let Some(outbound) = st.outbound.as_ref() else {
            return Err(ChannelError::NotOpen);
        };
        outbound
            .send(directive.encode(self.inner.config.format))
            .map_err(|_| ChannelError::NotOpen)?;
        st.info.record_sent();
        Ok(())
    }

    /// Reconnects immediately with a fresh attempt budget.
    ///
    /// Used after the reconnect policy gave up. Does nothing when no topic
    /// was opened or a connection is already live.
    pub async fn reconnect(&self) {
        {
            let mut st = self.inner.state.lock();
            if st.info.state.is_active() || st.info.topic.is_none() {
                return;
            }
            st.cancel_reconnect();
            st.info.reconnect_attempts = 0;
        }
        info!("manual realtime reconnect");
        self.inner.connect().await;
    }

    /// Closes the channel whenever the session ends.
    ///
    /// The watcher stops once the channel is dropped.
    #[must_use]
    pub fn close_on_session_end(
        &self,
        mut events: broadcast::Receiver<SessionEvent>,
    ) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.ends_session() => {
                        let Some(inner) = weak.upgrade() else { break };
                        debug!(?event, "session ended, closing realtime channel");
                        inner.shutdown();
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.inner.state.lock().teardown();
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state.lock();
        f.debug_struct("RealtimeChannel")
            .field("endpoint", &self.inner.config.endpoint)
            .field("state", &st.info.state)
            .field("generation", &st.generation)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn shutdown(&self) {
        let previous = {
            let mut st = self.state.lock();
            let previous = st.info.state;
            st.teardown();
            st.info.topic = None;
            previous
        };
        if previous != ConnectionState::Idle {
            info!("realtime channel closed");
            self.handler.connection_changed(ConnectionState::Idle);
        }
    }

    async fn connect(self: &Arc<Self>) {
        let generation = {
            let mut st = self.state.lock();
            if st.info.topic.is_none() || !st.apply(ConnectionEvent::Connect) {
                return;
            }
            st.generation += 1;
            st.pending_delay = None;
            st.generation
        };
        self.handler.connection_changed(ConnectionState::Connecting);

        let Some(token) = self.tokens.access_token() else {
            warn!("no valid access token for realtime connection");
            self.on_dropped(generation);
            return;
        };
        let url = match realtime_url(&self.config.endpoint, &token) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "invalid realtime endpoint");
                self.on_dropped(generation);
                return;
            }
        };

        debug!(generation, "connecting realtime channel");
        match self.transport.connect(&url).await {
            Ok(connection) => self.on_connected(generation, connection.outbound, connection.inbound),
            Err(e) => {
                warn!(error = %e, "realtime connection failed");
                self.on_dropped(generation);
            }
        }
    }

    fn on_connected(
        self: &Arc<Self>,
        generation: u64,
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        {
            let mut st = self.state.lock();
            if st.generation != generation || !st.apply(ConnectionEvent::Handshake) {
                debug!(generation, "discarding stale realtime connection");
                return;
            }
            st.info.connected(self.clock.now());
            st.opened_at = Some(Instant::now());

            if let Some(topic) = st.info.topic.clone() {
                let frame = Directive::Subscribe(topic).encode(self.config.format);
                if outbound.send(frame).is_ok() {
                    st.info.record_sent();
                }
            }
            st.outbound = Some(outbound);
            st.reader = Some(tokio::spawn(Self::read_loop(
                Arc::clone(self),
                generation,
                inbound,
            )));
        }
        info!(generation, "realtime channel open");
        self.handler.connection_changed(ConnectionState::Open);
    }

    async fn read_loop(
        self: Arc<Self>,
        generation: u64,
        mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = inbound.recv().await {
            match event {
                TransportEvent::Frame(text) => {
                    if !self.dispatch(generation, &text) {
                        return;
                    }
                }
                TransportEvent::Closed { code, reason } => {
                    info!(?code, %reason, "realtime connection closed by server");
                    break;
                }
                TransportEvent::Error(e) => {
                    warn!(error = %e, "realtime connection error");
                    break;
                }
            }
        }
        self.on_dropped(generation);
    }

    /// Returns false once `generation` is no longer current.
    fn dispatch(&self, generation: u64, text: &str) -> bool {
        let parsed = InboundEvent::parse(text);
        {
            let mut st = self.state.lock();
            if st.generation != generation {
                return false;
            }
            st.info.record_received(parsed.is_ok());
        }
        match parsed {
            Ok(event) => {
                debug!(kind = event.kind(), "realtime event");
                self.handler.handle(event);
            }
            Err(e) => warn!(error = %e, "dropping realtime frame"),
        }
        true
    }

    fn on_dropped(self: &Arc<Self>, generation: u64) {
        let (outcome, attempts) = {
            let mut st = self.state.lock();
            if st.generation != generation {
                return;
            }
            st.outbound = None;
            // Detach rather than abort: this may be the reader itself.
            st.reader.take();
            if !st.apply(ConnectionEvent::Dropped) {
                return;
            }
            if st
                .opened_at
                .take()
                .is_some_and(|at| at.elapsed() >= STABLE_CONNECTION)
            {
                st.info.reconnect_attempts = 0;
            }
            st.info.reconnect_attempts = st.info.reconnect_attempts.saturating_add(1);
            let attempt = st.info.reconnect_attempts;

            match self.config.policy.delay_for(attempt) {
                Some(delay) => {
                    st.pending_delay = Some(delay);
                    st.reconnect = Some(tokio::spawn(Self::reconnect_after(
                        Arc::clone(self),
                        generation,
                        delay,
                    )));
                    info!(attempt, delay = ?delay, "realtime reconnect scheduled");
                    (DropOutcome::Scheduled, attempt)
                }
                None => {
                    st.apply(ConnectionEvent::GiveUp);
                    (DropOutcome::GaveUp, attempt)
                }
            }
        };

        match outcome {
            DropOutcome::Scheduled => self.handler.connection_changed(ConnectionState::Closed),
            DropOutcome::GaveUp => {
                warn!(attempts = attempts - 1, "realtime reconnect attempts exhausted");
                self.handler.connection_changed(ConnectionState::Failed);
                self.notifier.notify(Notification::new(
                    NotificationKind::Realtime,
                    NotificationLevel::Warning,
                    CONNECTION_LOST_MESSAGE,
                ));
            }
        }
    }

    async fn reconnect_after(self: Arc<Self>, generation: u64, delay: Duration) {
        tokio::time::sleep(delay).await;
        {
            let mut st = self.state.lock();
            if st.generation != generation || st.info.state != ConnectionState::Closed {
                return;
            }
            st.reconnect.take();
        }
        self.connect().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;
    use url::Url;

    use super::*;
    use crate::ports::{TransportConnection, TransportError};
    use crate::testutil::{ManualClock, RecordingNotifier, settle};

    struct ServerEnd {
        received: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<TransportEvent>,
    }

    #[derive(Default)]
    struct FakeTransport {
        failures: Mutex<VecDeque<bool>>,
        attempts: Mutex<Vec<(Instant, Url)>>,
        servers: Mutex<Vec<ServerEnd>>,
        hang_up: Mutex<bool>,
    }

    impl FakeTransport {
        fn fail_next(&self, count: usize) {
            self.failures.lock().extend(std::iter::repeat_n(true, count));
        }

        fn attempt_count(&self) -> usize {
            self.attempts.lock().len()
        }

        fn last_attempt(&self) -> Instant {
            self.attempts.lock().last().map(|a| a.0).unwrap()
        }

        fn gaps_secs(&self) -> Vec<u64> {
            let attempts = self.attempts.lock();
            attempts
                .windows(2)
                .map(|w| (w[1].0 - w[0].0).as_secs())
                .collect()
        }

        fn server(&self, index: usize) -> ServerEnd {
            let mut servers = self.servers.lock();
            let (_, received) = mpsc::unbounded_channel::<String>();
            let (events, _) = mpsc::unbounded_channel::<TransportEvent>();
            std::mem::replace(&mut servers[index], ServerEnd { received, events })
        }

        fn hang_up_after_handshake(&self) {
            *self.hang_up.lock() = true;
        }
    }

    #[async_trait]
    impl RealtimeTransport for FakeTransport {
        async fn connect(&self, url: &Url) -> Result<TransportConnection, TransportError> {
            self.attempts.lock().push((Instant::now(), url.clone()));
            if self.failures.lock().pop_front().unwrap_or(false) {
                return Err(TransportError::ConnectionFailed("refused".to_string()));
            }
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            if *self.hang_up.lock() {
                let _ = in_tx.send(TransportEvent::Closed {
                    code: Some(1011),
                    reason: "going away".to_string(),
                });
            }
            self.servers.lock().push(ServerEnd {
                received: out_rx,
                events: in_tx,
            });
            Ok(TransportConnection {
                outbound: out_tx,
                inbound: in_rx,
            })
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<InboundEvent>>,
        states: Mutex<Vec<ConnectionState>>,
    }

    impl FrameHandler for RecordingHandler {
        fn handle(&self, event: InboundEvent) {
            self.events.lock().push(event);
        }

        fn connection_changed(&self, state: ConnectionState) {
            self.states.lock().push(state);
        }
    }

    struct StaticToken(Mutex<Option<String>>);

    impl AccessTokenSource for StaticToken {
        fn access_token(&self) -> Option<String> {
            self.0.lock().clone()
        }
    }

    struct Fixture {
        channel: RealtimeChannel,
        transport: Arc<FakeTransport>,
        handler: Arc<RecordingHandler>,
        notifier: Arc<RecordingNotifier>,
        token: Arc<StaticToken>,
    }

    fn fixture(policy: ReconnectPolicy) -> Fixture {
        let transport = Arc::new(FakeTransport::default());
        let handler = Arc::new(RecordingHandler::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let token = Arc::new(StaticToken(Mutex::new(Some("tok".to_string()))));
        let channel = RealtimeChannel::new(
            ChannelConfig::new("https://backend.test").with_policy(policy),
            transport.clone(),
            token.clone(),
            handler.clone(),
            notifier.clone(),
            Arc::new(ManualClock::default()),
        );
        Fixture {
            channel,
            transport,
            handler,
            notifier,
            token,
        }
    }

    #[tokio::test]
    async fn test_open_without_token_is_noop() {
        let f = fixture(ReconnectPolicy::default());
        *f.token.0.lock() = None;

        f.channel.open(Topic::company(7)).await;

        assert_eq!(f.channel.state(), ConnectionState::Idle);
        assert_eq!(f.transport.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_open_subscribes_and_dispatches_in_order() {
        let f = fixture(ReconnectPolicy::default());
        f.channel.open(Topic::company(7)).await;

        assert_eq!(f.channel.state(), ConnectionState::Open);
        let url = f.transport.attempts.lock()[0].1.clone();
        assert_eq!(
            url.as_str(),
            "wss://backend.test/api/v1/ws/crm/?access_token=tok"
        );

        let mut server = f.transport.server(0);
        let subscribe: serde_json::Value =
            serde_json::from_str(&server.received.recv().await.unwrap()).unwrap();
        assert_eq!(subscribe["cmd"], "subscribe");
        assert_eq!(subscribe["data"]["company_id"], 7);

        for text in [
            r#"{"type":"typing","data":{"appeal_id":1}}"#,
            "not json",
            r#"{"type":"NEW_MESSAGE","data":{"id":5,"appeal_id":1,"text":"hi"}}"#,
            r#"{"type":"update_appeal","data":{"id":1,"status":"closed"}}"#,
        ] {
            server.events.send(TransportEvent::Frame(text.to_string())).unwrap();
        }
        settle().await;

        let kinds: Vec<_> = f.handler.events.lock().iter().map(InboundEvent::kind).collect();
        assert_eq!(kinds, vec!["typing", "new_message", "appeal_update"]);
        let info = f.channel.info();
        assert_eq!(info.frames_received, 4);
        assert_eq!(info.frames_dropped, 1);
        assert_eq!(info.frames_sent, 1);
    }

    #[tokio::test]
    async fn test_open_is_idempotent_per_topic() {
        let f = fixture(ReconnectPolicy::default());
        f.channel.open(Topic::company(7)).await;
        f.channel.open(Topic::company(7)).await;
        assert_eq!(f.transport.attempt_count(), 1);

        f.channel.open(Topic::company(8)).await;
        assert_eq!(f.transport.attempt_count(), 2);
        assert_eq!(f.channel.info().topic, Some(Topic::company(8)));

        // first connection's outbound half was dropped
        let mut first = f.transport.server(0);
        assert!(first.received.recv().await.is_some());
        assert!(first.received.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_requires_open_channel() {
        let f = fixture(ReconnectPolicy::default());
        let ping = Directive::Raw(serde_json::json!({"cmd": "ping"}));
        assert_eq!(f.channel.send(&ping), Err(ChannelError::NotOpen));

        f.channel.open(Topic::company(7)).await;
        f.channel.send(&ping).unwrap();

        let mut server = f.transport.server(0);
        server.received.recv().await.unwrap();
        assert_eq!(server.received.recv().await.unwrap(), r#"{"cmd":"ping"}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_then_resets_after_stable_open() {
        let f = fixture(ReconnectPolicy::default());
        f.transport.fail_next(3);

        f.channel.open(Topic::company(7)).await;
        assert_eq!(f.channel.state(), ConnectionState::Closed);
        assert_eq!(f.channel.pending_reconnect_delay(), Some(Duration::from_secs(1)));

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(f.channel.state(), ConnectionState::Open);
        assert_eq!(f.channel.info().reconnect_attempts, 3);
        assert_eq!(f.transport.gaps_secs(), vec![1, 2, 3]);

        tokio::time::sleep(STABLE_CONNECTION).await;

        let server = f.transport.server(0);
        let closed_at = Instant::now();
        server
            .events
            .send(TransportEvent::Closed {
                code: Some(1006),
                reason: "abnormal".to_string(),
            })
            .unwrap();
        settle().await;
        assert_eq!(f.channel.pending_reconnect_delay(), Some(Duration::from_secs(1)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.channel.state(), ConnectionState::Open);
        assert_eq!((f.transport.last_attempt() - closed_at).as_secs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_right_after_handshake_keeps_counting() {
        let f = fixture(ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        });
        f.transport.hang_up_after_handshake();

        f.channel.open(Topic::company(7)).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(f.channel.state(), ConnectionState::Failed);
        assert_eq!(f.transport.attempt_count(), 3);
        assert_eq!(f.transport.gaps_secs(), vec![1, 2]);
        assert_eq!(f.notifier.notifications().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_then_manual_reconnect() {
        let f = fixture(ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        });
        f.transport.fail_next(3);

        f.channel.open(Topic::company(7)).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(f.channel.state(), ConnectionState::Failed);
        assert_eq!(f.transport.attempt_count(), 3);
        let notes = f.notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Realtime);
        assert!(f.handler.states.lock().contains(&ConnectionState::Failed));

        f.channel.reconnect().await;
        assert_eq!(f.channel.state(), ConnectionState::Open);
        assert_eq!(f.transport.attempt_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_reconnect() {
        let f = fixture(ReconnectPolicy::default());
        f.transport.fail_next(1);

        f.channel.open(Topic::company(7)).await;
        assert_eq!(f.channel.state(), ConnectionState::Closed);

        f.channel.close();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(f.channel.state(), ConnectionState::Idle);
        assert_eq!(f.transport.attempt_count(), 1);
        assert!(f.channel.pending_reconnect_delay().is_none());
    }

    #[tokio::test]
    async fn test_frames_after_close_are_ignored() {
        let f = fixture(ReconnectPolicy::default());
        f.channel.open(Topic::company(7)).await;
        let server = f.transport.server(0);

        f.channel.close();
        let _ = server
            .events
            .send(TransportEvent::Frame(r#"{"type":"typing","data":{"appeal_id":1}}"#.into()));
        settle().await;

        assert!(f.handler.events.lock().is_empty());
        assert_eq!(f.channel.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_session_end_closes_channel() {
        let f = fixture(ReconnectPolicy::default());
        let (tx, rx) = broadcast::channel(4);
        let watcher = f.channel.close_on_session_end(rx);
        f.channel.open(Topic::company(7)).await;

        tx.send(SessionEvent::LoggedOut).unwrap();
        settle().await;

        assert_eq!(f.channel.state(), ConnectionState::Idle);
        watcher.abort();
    }
}
