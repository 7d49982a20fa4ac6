//! REST side of the dialog view: sends, history and appeal listing.

use std::sync::Arc;

use chatdesk_domain::{
    Appeal, AppealPatch, Chat, CorrelationId, DialogMessage, Page, PageRequest, SendMessage,
    Sender, ServerMessage,
};
use tracing::{debug, warn};

use super::store::DialogStore;
use crate::auth::AuthorizedCalls;
use crate::error::{ApiError, ApplicationError, ApplicationResult};
use crate::ports::{BackendApi, Notifier};

/// Issues backend calls for dialogs and keeps the [`DialogStore`] in sync.
pub struct DialogService {
    api: Arc<dyn BackendApi>,
    calls: Arc<AuthorizedCalls>,
    store: Arc<DialogStore>,
    notifier: Arc<dyn Notifier>,
    sender: Sender,
}

impl DialogService {
    /// Creates the service. Outgoing messages are attributed to `sender`.
    #[must_use]
    pub fn new(
        api: Arc<dyn BackendApi>,
        calls: Arc<AuthorizedCalls>,
        store: Arc<DialogStore>,
        notifier: Arc<dyn Notifier>,
        sender: Sender,
    ) -> Self {
        Self {
            api,
            calls,
            store,
            notifier,
            sender,
        }
    }

    /// The store this service writes to.
    #[must_use]
    pub const fn store(&self) -> &Arc<DialogStore> {
        &self.store
    }

    fn report(&self, error: &ApiError) {
        // session endings redirect silently
        if !error.is_unauthorized() {
            self.notifier.notify(error.notification());
        }
    }

    /// Shows `text` immediately as a pending message, then submits it.
    ///
    /// # Errors
    ///
    /// Returns the API error after marking the pending entry as failed.
    pub async fn send_message(&self, appeal_id: i64, text: &str) -> ApplicationResult<DialogMessage> {
        let local = self.store.begin_local(appeal_id, self.sender.clone(), text);
        self.deliver(local).await
    }

    /// Resubmits a failed message under its original correlation id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no failed message has this id, or the API error.
    pub async fn retry_message(
        &self,
        correlation_id: &CorrelationId,
    ) -> ApplicationResult<DialogMessage> {
        let Some(message) = self.store.retry(correlation_id) else {
            return Err(ApplicationError::NotFound(format!(
                "failed message {correlation_id}"
            )));
        };
        self.deliver(message).await
    }

    async fn deliver(&self, local: DialogMessage) -> ApplicationResult<DialogMessage> {
        let body = SendMessage::text(local.appeal_id, local.text.clone());
        let api = &self.api;
        let body = &body;
        let result = self
            .calls
            .call(|token| async move { api.send_message(&token, body).await })
            .await;

        match result {
            Ok(server) => {
                let confirmed =
                    DialogMessage::confirmed(server.clone(), local.correlation_id.clone(), local.created_at);
                let outcome = self.store.confirm(&local.correlation_id, server);
                debug!(correlation_id = %local.correlation_id, ?outcome, "message confirmed");
                Ok(confirmed)
            }
            Err(e) => {
                warn!(correlation_id = %local.correlation_id, error = %e, "message send failed");
                self.store.fail(&local.correlation_id);
                self.report(&e);
                Err(e.into())
            }
        }
    }

    /// Loads a page of an appeal's history into the store.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn load_messages(
        &self,
        appeal_id: i64,
        page: PageRequest,
    ) -> ApplicationResult<Page<ServerMessage>> {
        let api = &self.api;
        let result = self
            .calls
            .call(|token| async move { api.list_messages(&token, appeal_id, page).await })
            .await
            .inspect_err(|e| self.report(e))?;

        let added = self.store.load_history(appeal_id, result.results.clone());
        debug!(appeal_id, added, total = result.total, "history loaded");
        Ok(result)
    }

    /// Loads a page of appeals into the store.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn load_appeals(
        &self,
        company_id: Option<i64>,
        page: PageRequest,
    ) -> ApplicationResult<Page<Appeal>> {
        let api = &self.api;
        let result = self
            .calls
            .call(|token| async move { api.list_appeals(&token, company_id, page).await })
            .await
            .inspect_err(|e| self.report(e))?;

        for appeal in &result.results {
            self.store.upsert_appeal(appeal.clone());
        }
        Ok(result)
    }

    /// Fetches one appeal and stores the current record.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn get_appeal(&self, appeal_id: i64) -> ApplicationResult<Appeal> {
        let api = &self.api;
        let appeal = self
            .calls
            .call(|token| async move { api.get_appeal(&token, appeal_id).await })
            .await
            .inspect_err(|e| self.report(e))?;

        self.store.upsert_appeal(appeal.clone());
        Ok(appeal)
    }

    /// Applies a partial update to an appeal.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn update_appeal(
        &self,
        appeal_id: i64,
        patch: &AppealPatch,
    ) -> ApplicationResult<Appeal> {
        let api = &self.api;
        let appeal = self
            .calls
            .call(|token| async move { api.update_appeal(&token, appeal_id, patch).await })
            .await
            .inspect_err(|e| self.report(e))?;

        self.store.upsert_appeal(appeal.clone());
        Ok(appeal)
    }

    /// Fetches a chat transcript.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn get_chat(&self, chat_id: i64) -> ApplicationResult<Chat> {
        let api = &self.api;
        let chat = self
            .calls
            .call(|token| async move { api.get_chat(&token, chat_id).await })
            .await
            .inspect_err(|e| self.report(e))?;
        Ok(chat)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::SessionEvent;
    use crate::testutil::{
        FakeAuthApi, FakeBackendApi, ManualClock, RecordingNotifier, sample_appeal, server_message,
        test_session,
    };
    use chatdesk_domain::{DeliveryStatus, NotificationKind};
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast;

    struct Fixture {
        service: DialogService,
        backend: Arc<FakeBackendApi>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture(backend: FakeBackendApi) -> Fixture {
        let (session, _, _) = test_session();
        session.set_tokens("access", "refresh");
        let (events, _) = broadcast::channel::<SessionEvent>(8);
        let calls = Arc::new(AuthorizedCalls::new(
            session,
            Arc::new(FakeAuthApi::default()),
            events,
        ));
        let backend = Arc::new(backend);
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(DialogStore::new(Arc::new(ManualClock::default())));
        let service = DialogService::new(
            backend.clone(),
            calls,
            store,
            notifier.clone(),
            Sender::operator("Ann"),
        );
        Fixture {
            service,
            backend,
            notifier,
        }
    }

    #[tokio::test]
    async fn test_send_confirms_optimistic_entry() {
        let f = fixture(FakeBackendApi::default().replying_with(server_message(42, 1, "hello")));

        let sent = f.service.send_message(1, "hello").await.unwrap();

        assert_eq!(sent.server_id, Some(42));
        let messages = f.service.store().messages(1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, DeliveryStatus::Sent);
        assert_eq!(messages[0].correlation_id, sent.correlation_id);
        assert_eq!(f.backend.sent(), vec![SendMessage::text(1, "hello")]);
    }

    #[tokio::test]
    async fn test_send_failure_marks_error_and_notifies() {
        let f = fixture(FakeBackendApi::default().failing_with(ApiError::Network("offline".into())));

        let err = f.service.send_message(1, "hello").await.unwrap_err();
        assert!(matches!(err, ApplicationError::Api(ApiError::Network(_))));

        let messages = f.service.store().messages(1);
        assert_eq!(messages[0].status, DeliveryStatus::Error);
        let notes = f.notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::NetworkUnreachable);
    }

    #[tokio::test]
    async fn test_retry_resends_failed_message() {
        let f = fixture(FakeBackendApi::default().failing_with(ApiError::from_status(502, None)));
        f.service.send_message(1, "hello").await.unwrap_err();
        let failed = f.service.store().messages(1)[0].clone();

        f.backend.reply_with(server_message(43, 1, "hello"));
        let sent = f.service.retry_message(&failed.correlation_id).await.unwrap();

        assert_eq!(sent.correlation_id, failed.correlation_id);
        assert_eq!(f.service.store().messages(1).len(), 1);
        assert_eq!(f.backend.sent().len(), 2);
        assert!(
            f.service
                .retry_message(&failed.correlation_id)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_get_appeal_refreshes_stored_record() {
        let f = fixture(FakeBackendApi::default().with_appeals(vec![sample_appeal(3, "in_work")]));
        f.service.store().upsert_appeal(sample_appeal(3, "new"));

        let appeal = f.service.get_appeal(3).await.unwrap();

        assert_eq!(appeal.status.as_deref(), Some("in_work"));
        assert_eq!(f.service.store().appeal(3), Some(appeal));
    }

    #[tokio::test]
    async fn test_get_unknown_appeal_reports_error() {
        let f = fixture(FakeBackendApi::default());

        let err = f.service.get_appeal(9).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Api(_)));
        assert_eq!(f.service.store().appeal(9), None);
        assert_eq!(f.notifier.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_load_messages_merges_history() {
        let f = fixture(
            FakeBackendApi::default()
                .with_history(vec![server_message(1, 7, "a"), server_message(2, 7, "b")]),
        );

        let page = f.service.load_messages(7, PageRequest::default()).await.unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(f.service.store().messages(7).len(), 2);

        f.service.load_messages(7, PageRequest::default()).await.unwrap();
        assert_eq!(f.service.store().messages(7).len(), 2);
    }
}
