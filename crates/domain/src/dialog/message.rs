//! Dialog message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::CorrelationId;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    /// The customer on the external channel.
    #[default]
    #[serde(alias = "user", alias = "client", alias = "customer")]
    EndUser,
    /// The configured LLM agent.
    #[serde(alias = "agent", alias = "assistant")]
    Bot,
    /// A human operator using the console.
    #[serde(alias = "manager", alias = "human")]
    Operator,
}

/// Sender descriptor shown next to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Sender {
    /// Author category.
    #[serde(default, alias = "type")]
    pub kind: SenderKind,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Sender {
    /// Sender for messages typed by the console operator.
    #[must_use]
    pub fn operator(name: impl Into<String>) -> Self {
        Self {
            kind: SenderKind::Operator,
            name: name.into(),
            avatar: None,
        }
    }
}

/// Delivery state of a visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Submitted locally, waiting for the server.
    Sending,
    /// Confirmed by the server.
    Sent,
    /// The send request failed.
    Error,
}

/// Canonical message record as returned by the backend or pushed over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Server id.
    pub id: i64,
    /// Appeal the message belongs to.
    #[serde(alias = "appeal")]
    pub appeal_id: i64,
    /// Body text.
    #[serde(default)]
    pub text: String,
    /// Author.
    #[serde(default)]
    pub sender: Sender,
    /// Creation time on the server.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Local correlation id echoed back by the server, when supported.
    #[serde(default, alias = "local_id", alias = "client_id")]
    pub correlation_id: Option<String>,
    /// Message type (`text`, `image`...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
}

/// Outbound message body for `POST /messages/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Target appeal.
    pub appeal_id: i64,
    /// Body text.
    pub text: String,
    /// Message type.
    #[serde(rename = "type")]
    pub message_type: String,
}

impl SendMessage {
    /// A plain text message.
    #[must_use]
    pub fn text(appeal_id: i64, text: impl Into<String>) -> Self {
        Self {
            appeal_id,
            text: text.into(),
            message_type: "text".to_string(),
        }
    }
}

/// One chat turn as shown in a dialog view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogMessage {
    /// Server id, absent until confirmed.
    pub server_id: Option<i64>,
    /// Client correlation id, stable for the life of the entry.
    pub correlation_id: CorrelationId,
    /// Appeal the message belongs to.
    pub appeal_id: i64,
    /// Author.
    pub sender: Sender,
    /// Body text.
    pub text: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Delivery state.
    pub status: DeliveryStatus,
}

impl DialogMessage {
    /// A freshly submitted message in `Sending` state.
    #[must_use]
    pub fn local(appeal_id: i64, sender: Sender, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            server_id: None,
            correlation_id: CorrelationId::generate(),
            appeal_id,
            sender,
            text: text.into(),
            created_at: now,
            status: DeliveryStatus::Sending,
        }
    }

    /// A confirmed message built from a server record.
    #[must_use]
    pub fn confirmed(
        message: ServerMessage,
        correlation_id: CorrelationId,
        fallback_time: DateTime<Utc>,
    ) -> Self {
        Self {
            server_id: Some(message.id),
            correlation_id,
            appeal_id: message.appeal_id,
            sender: message.sender,
            text: message.text,
            created_at: message.created_at.unwrap_or(fallback_time),
            status: DeliveryStatus::Sent,
        }
    }

    /// Returns true once the server has confirmed the message.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_aliases() {
        let json = r#"{
            "id": 5, "appeal": 9, "text": "hi",
            "sender": {"type": "manager", "name": "Ann"},
            "local_id": "local-abc"
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.appeal_id, 9);
        assert_eq!(msg.sender.kind, SenderKind::Operator);
        assert_eq!(msg.correlation_id.as_deref(), Some("local-abc"));
        assert!(msg.created_at.is_none());
    }

    #[test]
    fn test_send_message_wire_shape() {
        let body = serde_json::to_value(SendMessage::text(3, "hello")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"appeal_id": 3, "text": "hello", "type": "text"})
        );
    }

    #[test]
    fn test_confirmed_keeps_correlation() {
        let now = Utc::now();
        let local = DialogMessage::local(1, Sender::operator("me"), "yo", now);
        assert_eq!(local.status, DeliveryStatus::Sending);
        assert!(local.server_id.is_none());

        let server = ServerMessage {
            id: 77,
            appeal_id: 1,
            text: "yo".to_string(),
            sender: Sender::operator("me"),
            created_at: None,
            correlation_id: None,
            message_type: None,
        };
        let confirmed = DialogMessage::confirmed(server, local.correlation_id.clone(), now);
        assert!(confirmed.is_finalized());
        assert_eq!(confirmed.server_id, Some(77));
        assert_eq!(confirmed.correlation_id, local.correlation_id);
        assert_eq!(confirmed.created_at, now);
    }
}
