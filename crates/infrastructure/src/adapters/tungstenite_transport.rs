//! WebSocket transport using tokio-tungstenite.
//!
//! Each connection is driven by one task that bridges the socket to the
//! channel pair handed to the realtime channel.

use std::time::Duration;

use async_trait::async_trait;
use chatdesk_application::ports::{
    RealtimeTransport, TransportConnection, TransportError, TransportEvent,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`RealtimeTransport`] over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    connect_timeout: Duration,
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl TungsteniteTransport {
    /// Creates a transport with the given handshake timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl RealtimeTransport for TungsteniteTransport {
    async fn connect(&self, url: &Url) -> Result<TransportConnection, TransportError> {
        let (ws, response) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        debug!(status = response.status().as_u16(), host = ?url.host_str(), "websocket handshake complete");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(ws, outbound_rx, inbound_tx));

        Ok(TransportConnection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Moves frames between the socket and the channel pair until either side ends.
async fn pump(
    ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            text = outbound.recv() => {
                let Some(text) = text else {
                    // Owner dropped the connection.
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    warn!(error = %e, "websocket send failed");
                    let _ = inbound.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
            message = ws_rx.next() => {
                let event = match message {
                    Some(Ok(Message::Text(text))) => TransportEvent::Frame(text.to_string()),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Frame(text),
                        Err(_) => continue,
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                            .unwrap_or_default();
                        let _ = inbound.send(TransportEvent::Closed { code, reason });
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = inbound.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                    None => {
                        let _ = inbound.send(TransportEvent::Closed { code: None, reason: String::new() });
                        break;
                    }
                };
                if inbound.send(event).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    /// Echoes text frames until it receives `bye`, then closes normally.
    async fn echo_server() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                let Message::Text(text) = message else { continue };
                if text.as_str() == "bye" {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "done".into(),
                    };
                    let _ = ws.close(Some(frame)).await;
                    break;
                }
                ws.send(Message::Text(text)).await.unwrap();
            }
        });
        Url::parse(&format!("ws://{addr}/api/v1/ws/crm/?access_token=t")).unwrap()
    }

    #[tokio::test]
    async fn test_frames_and_close_are_bridged() {
        let url = echo_server().await;
        let mut connection = TungsteniteTransport::default().connect(&url).await.unwrap();

        connection.outbound.send("hello".to_string()).unwrap();
        assert_eq!(
            connection.inbound.recv().await,
            Some(TransportEvent::Frame("hello".to_string()))
        );

        connection.outbound.send("bye".to_string()).unwrap();
        assert_eq!(
            connection.inbound.recv().await,
            Some(TransportEvent::Closed {
                code: Some(1000),
                reason: "done".to_string()
            })
        );
        assert_eq!(connection.inbound.recv().await, None);
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("ws://{addr}/")).unwrap();
        let result = TungsteniteTransport::default().connect(&url).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}
