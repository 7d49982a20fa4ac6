//! Applies realtime events to the dialog store.

use std::sync::Arc;

use chatdesk_domain::{
    ConnectionState, InboundEvent, Notification, NotificationKind, SenderKind,
};
use tracing::debug;

use super::store::{DialogStore, Reconciliation};
use crate::ports::{FrameHandler, Notifier};

/// Realtime frame handler backing the dialog views.
pub struct DialogSync {
    store: Arc<DialogStore>,
    notifier: Arc<dyn Notifier>,
}

impl DialogSync {
    /// Creates a handler writing to `store`.
    #[must_use]
    pub fn new(store: Arc<DialogStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }
}

impl FrameHandler for DialogSync {
    fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::NewMessage(message) => {
                let appeal_id = message.appeal_id;
                let from_customer = message.sender.kind != SenderKind::Operator;
                if from_customer {
                    self.store.set_typing(appeal_id, false);
                }
                let outcome = self.store.apply_push(message);
                debug!(appeal_id, ?outcome, "pushed message applied");
                if outcome == Reconciliation::Appended && from_customer {
                    self.notifier.notify(Notification::info(
                        NotificationKind::NewMessage,
                        format!("New message in appeal #{appeal_id}"),
                    ));
                }
            }
            InboundEvent::AppealUpdated(patch) => {
                self.store.apply_appeal_patch(&patch);
            }
            InboundEvent::NewAppeal(appeal) => {
                let id = appeal.id;
                let client = appeal.client_name.clone();
                if self.store.upsert_appeal(appeal) {
                    let message = client.map_or_else(
                        || format!("New appeal #{id}"),
                        |name| format!("New appeal #{id} from {name}"),
                    );
                    self.notifier
                        .notify(Notification::info(NotificationKind::NewAppeal, message));
                }
            }
            InboundEvent::Typing(signal) => {
                self.store.set_typing(signal.appeal_id, signal.is_typing);
            }
            InboundEvent::Error { message } => {
                self.notifier
                    .notify(Notification::error(NotificationKind::Realtime, message));
            }
        }
    }

    fn connection_changed(&self, state: ConnectionState) {
        debug!(state = state.as_str(), "realtime state changed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testutil::{ManualClock, RecordingNotifier};
    use chatdesk_domain::{DeliveryStatus, Sender};
    use pretty_assertions::assert_eq;

    fn sync() -> (DialogSync, Arc<DialogStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(DialogStore::new(Arc::new(ManualClock::default())));
        let notifier = Arc::new(RecordingNotifier::default());
        (DialogSync::new(store.clone(), notifier.clone()), store, notifier)
    }

    fn frame(text: &str) -> InboundEvent {
        InboundEvent::parse(text).unwrap()
    }

    #[test]
    fn test_customer_message_notifies_once() {
        let (sync, store, notifier) = sync();
        let text = r#"{"type":"new_message","data":{"id":5,"appeal_id":1,"text":"hi","sender":{"type":"user","name":"Bob"}}}"#;

        sync.handle(frame(text));
        sync.handle(frame(text));

        assert_eq!(store.messages(1).len(), 1);
        let notes = notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::NewMessage);
    }

    #[test]
    fn test_own_message_push_finalizes_pending_entry() {
        let (sync, store, notifier) = sync();
        let local = store.begin_local(1, Sender::operator("Ann"), "hello");

        sync.handle(frame(&format!(
            r#"{{"type":"NEW_MESSAGE","data":{{"id":9,"appeal_id":1,"text":"hello","sender":{{"type":"operator"}},"local_id":"{}"}}}}"#,
            local.correlation_id
        )));

        let messages = store.messages(1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, DeliveryStatus::Sent);
        assert!(notifier.notifications().is_empty());
    }

    #[test]
    fn test_appeal_events_and_typing() {
        let (sync, store, notifier) = sync();

        sync.handle(frame(r#"{"type":"new_appeal","data":{"id":3,"client_name":"Bob"}}"#));
        sync.handle(frame(r#"{"type":"appeal_update","data":{"appeal_id":3,"status":"closed"}}"#));
        sync.handle(frame(r#"{"type":"typing","data":{"appeal_id":3}}"#));

        assert_eq!(store.appeal(3).unwrap().status.as_deref(), Some("closed"));
        assert!(store.is_typing(3));
        assert_eq!(notifier.notifications()[0].message, "New appeal #3 from Bob");
    }

    #[test]
    fn test_error_frame_notifies() {
        let (sync, _, notifier) = sync();
        sync.handle(frame(r#"{"type":"error","message":"subscription rejected"}"#));

        let notes = notifier.notifications();
        assert_eq!(notes[0].kind, NotificationKind::Realtime);
        assert_eq!(notes[0].message, "subscription rejected");
    }
}
