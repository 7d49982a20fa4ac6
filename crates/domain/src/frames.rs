//! Inbound realtime frame decoding.
//!
//! Server frames are JSON objects tagged by a `type` field. The affected
//! record is carried in `data`, `payload`, `message` or `appeal`, or the
//! frame itself is the record. Both the upper-case and snake-case tag
//! spellings used by the backend are accepted.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::dialog::{Appeal, AppealPatch, Sender, ServerMessage};
use crate::error::{DomainError, DomainResult};

/// Payload keys checked, in order, for the record carried by a frame.
const PAYLOAD_KEYS: &[&str] = &["data", "payload", "message", "appeal"];

/// Typing indicator payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypingSignal {
    /// Appeal where someone is typing.
    #[serde(alias = "appeal")]
    pub appeal_id: i64,
    /// False when the sender stopped typing.
    #[serde(default = "default_is_typing")]
    pub is_typing: bool,
    /// Who is typing.
    #[serde(default)]
    pub sender: Option<Sender>,
}

const fn default_is_typing() -> bool {
    true
}

/// A decoded server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message was added to an appeal.
    NewMessage(ServerMessage),
    /// Some fields of an appeal changed.
    AppealUpdated(AppealPatch),
    /// A new appeal was opened.
    NewAppeal(Appeal),
    /// Typing indicator.
    Typing(TypingSignal),
    /// Server-side error to surface to the user.
    Error {
        /// Error text.
        message: String,
    },
}

impl InboundEvent {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedFrame` for non-JSON input, a missing or
    /// unknown `type` tag, or a payload that does not match the tag.
    pub fn parse(text: &str) -> DomainResult<Self> {
        let frame: Value = serde_json::from_str(text)
            .map_err(|e| DomainError::MalformedFrame(format!("not JSON: {e}")))?;
        let Some(object) = frame.as_object() else {
            return Err(DomainError::MalformedFrame("frame is not an object".to_string()));
        };
        let Some(tag) = object.get("type").and_then(Value::as_str) else {
            return Err(DomainError::MalformedFrame("missing type tag".to_string()));
        };

        match tag {
            "NEW_MESSAGE" | "new_message" => Ok(Self::NewMessage(decode_payload(object)?)),
            "UPDATE_APPEAL" | "update_appeal" | "appeal_update" => {
                let patch: AppealPatch = decode_payload(object)?;
                if patch.id.is_none() {
                    return Err(DomainError::MalformedFrame(
                        "appeal update without id".to_string(),
                    ));
                }
                Ok(Self::AppealUpdated(patch))
            }
            "NEW_APPEAL" | "new_appeal" => Ok(Self::NewAppeal(decode_payload(object)?)),
            "TYPING" | "typing" => Ok(Self::Typing(decode_payload(object)?)),
            "ERROR" | "error" => Ok(Self::Error {
                message: error_message(object),
            }),
            other => Err(DomainError::MalformedFrame(format!(
                "unknown frame type: {other}"
            ))),
        }
    }

    /// Short name of the event kind, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::AppealUpdated(_) => "appeal_update",
            Self::NewAppeal(_) => "new_appeal",
            Self::Typing(_) => "typing",
            Self::Error { .. } => "error",
        }
    }
}

fn payload(object: &Map<String, Value>) -> Value {
    PAYLOAD_KEYS
        .iter()
        .find_map(|key| object.get(*key).filter(|value| value.is_object()).cloned())
        .unwrap_or_else(|| Value::Object(object.clone()))
}

fn decode_payload<T: DeserializeOwned>(object: &Map<String, Value>) -> DomainResult<T> {
    serde_json::from_value(payload(object))
        .map_err(|e| DomainError::MalformedFrame(format!("unexpected payload: {e}")))
}

fn error_message(object: &Map<String, Value>) -> String {
    let text_of = |map: &Map<String, Value>| {
        ["message", "detail", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str).map(ToString::to_string))
    };
    text_of(object)
        .or_else(|| payload(object).as_object().and_then(text_of))
        .unwrap_or_else(|| "Unknown realtime error".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dialog::SenderKind;

    #[test]
    fn test_new_message_both_spellings() {
        for tag in ["NEW_MESSAGE", "new_message"] {
            let frame = format!(
                r#"{{"type":"{tag}","data":{{"id":1,"appeal_id":2,"text":"hi","sender":{{"kind":"bot","name":"Agent"}}}}}}"#
            );
            let InboundEvent::NewMessage(message) = InboundEvent::parse(&frame).unwrap() else {
                panic!("expected new message for {tag}");
            };
            assert_eq!(message.id, 1);
            assert_eq!(message.sender.kind, SenderKind::Bot);
        }
    }

    #[test]
    fn test_message_under_message_key() {
        let frame = r#"{"type":"new_message","message":{"id":3,"appeal_id":4,"text":"x"}}"#;
        assert_eq!(InboundEvent::parse(frame).unwrap().kind(), "new_message");
    }

    #[test]
    fn test_appeal_update_flat_payload() {
        let frame = r#"{"type":"appeal_update","appeal_id":9,"status":"closed"}"#;
        let InboundEvent::AppealUpdated(patch) = InboundEvent::parse(frame).unwrap() else {
            panic!("expected appeal update");
        };
        assert_eq!(patch.id, Some(9));
        assert_eq!(patch.status.as_deref(), Some("closed"));
    }

    #[test]
    fn test_appeal_update_requires_id() {
        let frame = r#"{"type":"UPDATE_APPEAL","data":{"status":"closed"}}"#;
        assert!(InboundEvent::parse(frame).is_err());
    }

    #[test]
    fn test_typing_defaults_to_true() {
        let frame = r#"{"type":"TYPING","data":{"appeal_id":5}}"#;
        let InboundEvent::Typing(signal) = InboundEvent::parse(frame).unwrap() else {
            panic!("expected typing");
        };
        assert!(signal.is_typing);
    }

    #[test]
    fn test_error_message_sources() {
        let top = InboundEvent::parse(r#"{"type":"ERROR","message":"quota exceeded"}"#).unwrap();
        assert_eq!(top, InboundEvent::Error { message: "quota exceeded".to_string() });

        let nested = InboundEvent::parse(r#"{"type":"error","data":{"detail":"bad token"}}"#).unwrap();
        assert_eq!(nested, InboundEvent::Error { message: "bad token".to_string() });

        let bare = InboundEvent::parse(r#"{"type":"ERROR"}"#).unwrap();
        assert_eq!(bare, InboundEvent::Error { message: "Unknown realtime error".to_string() });
    }

    #[test]
    fn test_malformed_frames_are_rejected() {
        for frame in ["", "[]", "42", r#"{"data":{}}"#, r#"{"type":"pong"}"#, r#"{"type":"new_message","data":{"text":"no id"}}"#] {
            assert!(InboundEvent::parse(frame).is_err(), "accepted {frame}");
        }
    }
}
