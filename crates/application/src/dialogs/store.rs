//! In-memory dialog state: messages per appeal, appeals and typing flags.
//!
//! Messages are keyed by correlation id. An optimistic entry is finalized
//! by whichever of the HTTP confirmation and the realtime push arrives
//! first; the later arrival for the same message changes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chatdesk_domain::{
    Appeal, AppealPatch, CorrelationId, DeliveryStatus, DialogMessage, Sender, ServerMessage,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::ports::Clock;

/// Seconds after which a typing flag without follow-up clears itself.
pub const TYPING_TIMEOUT_SECONDS: i64 = 5;

/// Result of applying a server record to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// A new entry was appended.
    Appended,
    /// A pending local entry was finalized.
    Finalized,
    /// The message was already known; nothing changed.
    Duplicate,
    /// A separately appended copy existed; the local entry was removed.
    MergedDuplicate,
}

/// Dialog state shared by the service and the realtime handler.
pub struct DialogStore {
    clock: Arc<dyn Clock>,
    inner: RwLock<Dialogs>,
}

#[derive(Default)]
struct Dialogs {
    messages: HashMap<CorrelationId, DialogMessage>,
    order: HashMap<i64, Vec<CorrelationId>>,
    by_server_id: HashMap<i64, CorrelationId>,
    appeals: HashMap<i64, Appeal>,
    typing: HashMap<i64, DateTime<Utc>>,
}

impl Dialogs {
    fn insert(&mut self, message: DialogMessage) {
        if let Some(server_id) = message.server_id {
            self.by_server_id
                .insert(server_id, message.correlation_id.clone());
        }
        self.order
            .entry(message.appeal_id)
            .or_default()
            .push(message.correlation_id.clone());
        self.messages.insert(message.correlation_id.clone(), message);
    }

    fn remove(&mut self, correlation_id: &CorrelationId) {
        let Some(message) = self.messages.remove(correlation_id) else {
            return;
        };
        if let Some(order) = self.order.get_mut(&message.appeal_id) {
            order.retain(|id| id != correlation_id);
        }
        if let Some(server_id) = message.server_id
            && self.by_server_id.get(&server_id) == Some(correlation_id)
        {
            self.by_server_id.remove(&server_id);
        }
    }

    fn finalize(&mut self, correlation_id: &CorrelationId, server: ServerMessage) -> bool {
        let Some(entry) = self.messages.get_mut(correlation_id) else {
            return false;
        };
        if entry.is_finalized() {
            return false;
        }
        entry.server_id = Some(server.id);
        entry.status = DeliveryStatus::Sent;
        entry.text = server.text;
        if let Some(created_at) = server.created_at {
            entry.created_at = created_at;
        }
        self.by_server_id.insert(server.id, correlation_id.clone());
        true
    }

    /// First pending local entry of the appeal with the same author kind and text.
    fn pending_match(&self, server: &ServerMessage) -> Option<CorrelationId> {
        self.order.get(&server.appeal_id)?.iter().find_map(|id| {
            let message = self.messages.get(id)?;
            (message.server_id.is_none()
                && message.status == DeliveryStatus::Sending
                && message.sender.kind == server.sender.kind
                && message.text == server.text)
                .then(|| id.clone())
        })
    }

    fn touch_appeal(&mut self, message: &DialogMessage) {
        if let Some(appeal) = self.appeals.get_mut(&message.appeal_id) {
            appeal.last_message = Some(message.text.clone());
            appeal.updated_at = Some(message.created_at);
        }
    }
}

impl DialogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: RwLock::new(Dialogs::default()),
        }
    }

    /// Adds an optimistic message in `Sending` state and returns it.
    pub fn begin_local(&self, appeal_id: i64, sender: Sender, text: &str) -> DialogMessage {
        let message = DialogMessage::local(appeal_id, sender, text, self.clock.now());
        debug!(appeal_id, correlation_id = %message.correlation_id, "optimistic message added");
        self.inner.write().insert(message.clone());
        message
    }

    /// Applies the HTTP confirmation of a locally submitted message.
    pub fn confirm(&self, correlation_id: &CorrelationId, server: ServerMessage) -> Reconciliation {
        let mut dialogs = self.inner.write();

        if let Some(existing) = dialogs.by_server_id.get(&server.id).cloned() {
            if &existing == correlation_id {
                return Reconciliation::Duplicate;
            }
            debug!(server_id = server.id, "push arrived first, dropping local copy");
            dialogs.remove(correlation_id);
            return Reconciliation::MergedDuplicate;
        }

        let Some(entry) = dialogs.messages.get(correlation_id) else {
            let message =
                DialogMessage::confirmed(server, correlation_id.clone(), self.clock.now());
            dialogs.insert(message);
            return Reconciliation::Appended;
        };

        if !entry.is_finalized() {
            dialogs.finalize(correlation_id, server);
            return Reconciliation::Finalized;
        }

        // The local entry was claimed by another record; keep ours separately.
        debug!(
            server_id = server.id,
            claimed_by = ?entry.server_id,
            "local entry already finalized, appending confirmation"
        );
        let own_id = CorrelationId::for_server_message(server.id);
        let message = DialogMessage::confirmed(server, own_id, self.clock.now());
        dialogs.touch_appeal(&message);
        dialogs.insert(message);
        Reconciliation::Appended
    }

    /// Marks a pending message as failed. Returns false if it was already finalized.
    pub fn fail(&self, correlation_id: &CorrelationId) -> bool {
        let mut dialogs = self.inner.write();
        match dialogs.messages.get_mut(correlation_id) {
            Some(message) if !message.is_finalized() => {
                message.status = DeliveryStatus::Error;
                true
            }
            _ => false,
        }
    }

    /// Moves a failed message back to `Sending` and returns it for resubmission.
    pub fn retry(&self, correlation_id: &CorrelationId) -> Option<DialogMessage> {
        let mut dialogs = self.inner.write();
        let message = dialogs.messages.get_mut(correlation_id)?;
        if message.status != DeliveryStatus::Error {
            return None;
        }
        message.status = DeliveryStatus::Sending;
        Some(message.clone())
    }

    /// Applies a message pushed over the realtime channel.
    ///
    /// Matches a pending entry by echoed correlation id, then by
    /// (appeal, sender kind, text); otherwise appends.
    pub fn apply_push(&self, server: ServerMessage) -> Reconciliation {
        let mut dialogs = self.inner.write();

        if dialogs.by_server_id.contains_key(&server.id) {
            return Reconciliation::Duplicate;
        }

        let echoed = server
            .correlation_id
            .as_ref()
            .map(CorrelationId::from_raw)
            .filter(|id| dialogs.messages.contains_key(id));
        let matched = echoed.or_else(|| dialogs.pending_match(&server));

        if let Some(correlation_id) = matched {
            return if dialogs.finalize(&correlation_id, server) {
                Reconciliation::Finalized
            } else {
                Reconciliation::Duplicate
            };
        }

        let correlation_id = CorrelationId::for_server_message(server.id);
        let message = DialogMessage::confirmed(server, correlation_id, self.clock.now());
        dialogs.touch_appeal(&message);
        dialogs.insert(message);
        Reconciliation::Appended
    }

    /// Merges a page of history. Known messages are kept; the appeal stays ordered by time.
    pub fn load_history(&self, appeal_id: i64, history: Vec<ServerMessage>) -> usize {
        let now = self.clock.now();
        let mut dialogs = self.inner.write();
        let mut added = 0;
        for server in history {
            if dialogs.by_server_id.contains_key(&server.id) {
                continue;
            }
            let correlation_id = CorrelationId::for_server_message(server.id);
            dialogs.insert(DialogMessage::confirmed(server, correlation_id, now));
            added += 1;
        }

        let Dialogs {
            messages, order, ..
        } = &mut *dialogs;
        if let Some(order) = order.get_mut(&appeal_id) {
            order.sort_by_key(|id| messages.get(id).map(|m| m.created_at));
        }
        added
    }

    /// Messages of an appeal in display order.
    #[must_use]
    pub fn messages(&self, appeal_id: i64) -> Vec<DialogMessage> {
        let dialogs = self.inner.read();
        dialogs
            .order
            .get(&appeal_id)
            .map(|order| {
                order
                    .iter()
                    .filter_map(|id| dialogs.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// One message by correlation id.
    #[must_use]
    pub fn message(&self, correlation_id: &CorrelationId) -> Option<DialogMessage> {
        self.inner.read().messages.get(correlation_id).cloned()
    }

    /// Inserts or replaces an appeal. Returns true if it was new.
    pub fn upsert_appeal(&self, appeal: Appeal) -> bool {
        self.inner.write().appeals.insert(appeal.id, appeal).is_none()
    }

    /// Merges a partial update into a known appeal and returns the result.
    pub fn apply_appeal_patch(&self, patch: &AppealPatch) -> Option<Appeal> {
        let id = patch.id?;
        let mut dialogs = self.inner.write();
        let Some(appeal) = dialogs.appeals.get_mut(&id) else {
            debug!(appeal_id = id, "update for unknown appeal ignored");
            return None;
        };
        appeal.merge(patch);
        Some(appeal.clone())
    }

    /// One appeal.
    #[must_use]
    pub fn appeal(&self, appeal_id: i64) -> Option<Appeal> {
        self.inner.read().appeals.get(&appeal_id).cloned()
    }

    /// All known appeals, most recently updated first.
    #[must_use]
    pub fn appeals(&self) -> Vec<Appeal> {
        let mut appeals: Vec<Appeal> = self.inner.read().appeals.values().cloned().collect();
        appeals.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        appeals
    }

    /// Sets or clears the typing flag of an appeal.
    pub fn set_typing(&self, appeal_id: i64, is_typing: bool) {
        let mut dialogs = self.inner.write();
        if is_typing {
            dialogs.typing.insert(appeal_id, self.clock.now());
        } else {
            dialogs.typing.remove(&appeal_id);
        }
    }

    /// Returns true if a typing signal arrived within the timeout.
    #[must_use]
    pub fn is_typing(&self, appeal_id: i64) -> bool {
        self.inner.read().typing.get(&appeal_id).is_some_and(|since| {
            self.clock.since(*since) < chrono::Duration::seconds(TYPING_TIMEOUT_SECONDS)
        })
    }
}

impl std::fmt::Debug for DialogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dialogs = self.inner.read();
        f.debug_struct("DialogStore")
            .field("messages", &dialogs.messages.len())
            .field("appeals", &dialogs.appeals.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testutil::{ManualClock, server_message};
    use chatdesk_domain::SenderKind;
    use pretty_assertions::assert_eq;

    fn store() -> (DialogStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (DialogStore::new(clock.clone()), clock)
    }

    fn operator_message(id: i64, appeal_id: i64, text: &str) -> ServerMessage {
        ServerMessage {
            sender: Sender::operator("Ann"),
            ..server_message(id, appeal_id, text)
        }
    }

    fn sent_count(store: &DialogStore, appeal_id: i64) -> usize {
        store
            .messages(appeal_id)
            .iter()
            .filter(|m| m.status == DeliveryStatus::Sent)
            .count()
    }

    #[test]
    fn test_http_then_push_yields_one_entry() {
        let (store, _) = store();
        let local = store.begin_local(1, Sender::operator("Ann"), "hello");
        assert_eq!(store.messages(1)[0].status, DeliveryStatus::Sending);

        let confirmed = server_message(10, 1, "hello");
        assert_eq!(
            store.confirm(&local.correlation_id, confirmed.clone()),
            Reconciliation::Finalized
        );
        assert_eq!(store.apply_push(confirmed), Reconciliation::Duplicate);

        assert_eq!(store.messages(1).len(), 1);
        assert_eq!(sent_count(&store, 1), 1);
    }

    #[test]
    fn test_push_then_http_yields_one_entry() {
        let (store, _) = store();
        let local = store.begin_local(1, Sender::operator("Ann"), "hello");

        let mut pushed = server_message(10, 1, "hello");
        pushed.correlation_id = Some(local.correlation_id.as_str().to_string());
        assert_eq!(store.apply_push(pushed), Reconciliation::Finalized);
        assert_eq!(
            store.confirm(&local.correlation_id, server_message(10, 1, "hello")),
            Reconciliation::Duplicate
        );

        let messages = store.messages(1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].server_id, Some(10));
        assert_eq!(messages[0].correlation_id, local.correlation_id);
    }

    #[test]
    fn test_push_without_echo_matches_pending_text() {
        let (store, _) = store();
        let local = store.begin_local(1, Sender::operator("Ann"), "hello");
        store.begin_local(1, Sender::operator("Ann"), "second");

        assert_eq!(
            store.apply_push(operator_message(10, 1, "hello")),
            Reconciliation::Finalized
        );
        assert_eq!(
            store.message(&local.correlation_id).unwrap().status,
            DeliveryStatus::Sent
        );
        assert_eq!(store.messages(1).len(), 2);
    }

    #[test]
    fn test_customer_echoing_operator_text_keeps_both_messages() {
        let (store, _) = store();
        let local = store.begin_local(1, Sender::operator("Ann"), "ok");

        assert_eq!(
            store.apply_push(server_message(20, 1, "ok")),
            Reconciliation::Appended
        );
        assert_eq!(
            store.confirm(&local.correlation_id, operator_message(21, 1, "ok")),
            Reconciliation::Finalized
        );

        let messages = store.messages(1);
        assert_eq!(messages.len(), 2);
        let ours = store.message(&local.correlation_id).unwrap();
        assert_eq!(ours.server_id, Some(21));
        assert_eq!(ours.sender.kind, SenderKind::Operator);
        let theirs = messages.iter().find(|m| m.server_id == Some(20)).unwrap();
        assert_eq!(theirs.sender.kind, SenderKind::EndUser);
    }

    #[test]
    fn test_confirmation_for_claimed_entry_is_appended() {
        let (store, _) = store();
        let local = store.begin_local(1, Sender::operator("Ann"), "ok");

        let mut pushed = operator_message(20, 1, "ok");
        pushed.correlation_id = Some(local.correlation_id.as_str().to_string());
        assert_eq!(store.apply_push(pushed), Reconciliation::Finalized);

        assert_eq!(
            store.confirm(&local.correlation_id, operator_message(21, 1, "ok")),
            Reconciliation::Appended
        );
        let ids: Vec<_> = store.messages(1).iter().map(|m| m.server_id).collect();
        assert_eq!(ids, vec![Some(20), Some(21)]);
    }

    #[test]
    fn test_unmatched_push_is_merged_on_confirmation() {
        let (store, _) = store();
        let local = store.begin_local(1, Sender::operator("Ann"), "hello ");

        // server normalized the text, so the push could not be matched
        assert_eq!(
            store.apply_push(server_message(10, 1, "hello")),
            Reconciliation::Appended
        );
        assert_eq!(store.messages(1).len(), 2);

        assert_eq!(
            store.confirm(&local.correlation_id, server_message(10, 1, "hello")),
            Reconciliation::MergedDuplicate
        );
        assert_eq!(store.messages(1).len(), 1);
        assert_eq!(sent_count(&store, 1), 1);
    }

    #[test]
    fn test_fail_and_retry() {
        let (store, _) = store();
        let local = store.begin_local(1, Sender::operator("Ann"), "hello");

        assert!(store.fail(&local.correlation_id));
        assert_eq!(
            store.message(&local.correlation_id).unwrap().status,
            DeliveryStatus::Error
        );
        // an error entry is not matched by pushes
        assert_eq!(
            store.apply_push(server_message(11, 1, "hello")),
            Reconciliation::Appended
        );

        let retried = store.retry(&local.correlation_id).unwrap();
        assert_eq!(retried.status, DeliveryStatus::Sending);
        assert!(store.retry(&local.correlation_id).is_none());

        store.confirm(&local.correlation_id, server_message(12, 1, "hello"));
        assert!(!store.fail(&local.correlation_id));
    }

    #[test]
    fn test_history_is_merged_in_time_order() {
        let (store, clock) = store();
        let base = clock.now();
        let mut older = server_message(1, 1, "first");
        older.created_at = Some(base - chrono::Duration::minutes(10));
        let mut newer = server_message(2, 1, "second");
        newer.created_at = Some(base - chrono::Duration::minutes(5));

        store.apply_push(newer.clone());
        let local = store.begin_local(1, Sender::operator("Ann"), "draft");
        assert_eq!(store.load_history(1, vec![newer, older]), 1);

        let texts: Vec<_> = store.messages(1).into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["first", "second", "draft"]);
        assert!(store.message(&local.correlation_id).is_some());
    }

    #[test]
    fn test_appeal_patch_merges_known_appeals() {
        let (store, _) = store();
        let appeal: Appeal =
            serde_json::from_value(serde_json::json!({"id": 4, "status": "new"})).unwrap();
        assert!(store.upsert_appeal(appeal.clone()));
        assert!(!store.upsert_appeal(appeal));

        let merged = store.apply_appeal_patch(&AppealPatch {
            id: Some(4),
            ..AppealPatch::status("closed")
        });
        assert_eq!(merged.unwrap().status.as_deref(), Some("closed"));
        assert!(
            store
                .apply_appeal_patch(&AppealPatch {
                    id: Some(99),
                    ..AppealPatch::status("closed")
                })
                .is_none()
        );
    }

    #[test]
    fn test_typing_flag_expires() {
        let (store, clock) = store();
        store.set_typing(3, true);
        assert!(store.is_typing(3));

        clock.advance_secs(TYPING_TIMEOUT_SECONDS);
        assert!(!store.is_typing(3));

        store.set_typing(3, true);
        store.set_typing(3, false);
        assert!(!store.is_typing(3));
    }
}
