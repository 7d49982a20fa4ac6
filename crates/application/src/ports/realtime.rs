//! Realtime transport ports

use async_trait::async_trait;
use chatdesk_domain::{ConnectionState, InboundEvent};
use tokio::sync::mpsc;
use url::Url;

/// Something the transport observed on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame.
    Frame(String),
    /// The peer closed the connection.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
    /// The connection failed.
    Error(String),
}

/// Both halves of an established connection.
///
/// Dropping `outbound` closes the connection; the transport ends the
/// inbound stream once the socket is gone.
#[derive(Debug)]
pub struct TransportConnection {
    /// Text frames to send.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames and lifecycle events received.
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Errors establishing a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Handshake failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// Handshake did not finish in time.
    #[error("connection timeout")]
    Timeout,
}

/// Port for opening duplex text connections.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Opens a connection to `url`.
    async fn connect(&self, url: &Url) -> Result<TransportConnection, TransportError>;
}

/// Receives decoded realtime events in arrival order.
pub trait FrameHandler: Send + Sync {
    /// Handles one inbound event.
    fn handle(&self, event: InboundEvent);

    /// Observes connection state changes.
    fn connection_changed(&self, _state: ConnectionState) {}
}

/// Supplies the credential the realtime channel connects with.
pub trait AccessTokenSource: Send + Sync {
    /// A currently valid access token, if any.
    fn access_token(&self) -> Option<String>;
}
