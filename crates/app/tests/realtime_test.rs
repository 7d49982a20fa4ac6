//! Realtime channel against a local WebSocket server, reconciling with REST sends.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatdesk_application::ports::FrameHandler;
use chatdesk_application::{ChannelConfig, DialogService, DialogStore, DialogSync, RealtimeChannel};
use chatdesk_domain::{ConnectionState, DeliveryStatus, Sender, Topic};
use chatdesk_infrastructure::{TracingNotifier, TungsteniteTransport};
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{harness, token};

/// Accepts one connection, reports every received text frame on `seen`
/// and pushes every string sent on the returned channel.
async fn realtime_server() -> (String, mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut sink, mut source) = ws.split();
        loop {
            tokio::select! {
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let _ = seen_tx.send(text.to_string());
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
                outgoing = push_rx.recv() => match outgoing {
                    Some(text) => sink.send(Message::Text(text.into())).await.unwrap(),
                    None => break,
                },
            }
        }
    });

    (format!("ws://{addr}/api/v1/ws/crm/"), seen_rx, push_tx)
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_pushes_and_sends_reconcile_into_one_timeline() {
    let backend = MockServer::start().await;
    let dir = tempdir().unwrap();
    let h = harness(&backend.uri(), &dir.path().join("session.json"));
    h.session
        .set_tokens(&token("1", 3600), &token("1", 86_400));

    Mock::given(method("POST"))
        .and(path("/api/v1/messages/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 101,
            "appeal_id": 7,
            "text": "How can I help?",
            "sender": {"kind": "operator", "name": "Ann"},
            "created_at": "2026-01-01T09:00:05Z",
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let (endpoint, mut seen, push) = realtime_server().await;
    let store = Arc::new(DialogStore::new(h.clock.clone()));
    let notifier = Arc::new(TracingNotifier);
    let handler: Arc<dyn FrameHandler> = Arc::new(DialogSync::new(store.clone(), notifier.clone()));
    let channel = RealtimeChannel::new(
        ChannelConfig::new(endpoint),
        Arc::new(TungsteniteTransport::default()),
        h.session.clone(),
        handler,
        notifier.clone(),
        h.clock.clone(),
    );
    let service = DialogService::new(
        h.backend.clone(),
        h.auth.authorized().clone(),
        store.clone(),
        notifier,
        Sender::operator("Ann"),
    );

    channel.open(Topic::company(10)).await;
    let subscribe: serde_json::Value =
        serde_json::from_str(&seen.recv().await.unwrap()).unwrap();
    assert_eq!(subscribe["cmd"], "subscribe");
    assert_eq!(subscribe["data"]["company_id"], 10);
    assert_eq!(channel.state(), ConnectionState::Open);

    push.send(
        json!({
            "type": "new_message",
            "data": {"id": 100, "appeal_id": 7, "text": "Hello?", "sender": {"kind": "user", "name": "Bob"}},
        })
        .to_string(),
    )
    .unwrap();
    eventually(|| store.messages(7).len() == 1).await;

    let sent = service.send_message(7, "How can I help?").await.unwrap();
    assert_eq!(sent.server_id, Some(101));

    // The echo of our own message arrives after the REST confirmation.
    push.send(
        json!({
            "type": "NEW_MESSAGE",
            "message": {"id": 101, "appeal_id": 7, "text": "How can I help?", "sender": {"kind": "operator", "name": "Ann"}},
        })
        .to_string(),
    )
    .unwrap();
    push.send(json!({"type": "typing", "data": {"appeal_id": 7}}).to_string())
        .unwrap();
    eventually(|| store.is_typing(7)).await;

    let timeline = store.messages(7);
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].text, "Hello?");
    assert_eq!(timeline[1].server_id, Some(101));
    assert_eq!(timeline[1].status, DeliveryStatus::Sent);
    assert_eq!(channel.info().frames_received, 3);

    channel.close();
    assert_eq!(channel.state(), ConnectionState::Idle);
}
