//! Backend REST port consumed by the messaging layer

use async_trait::async_trait;
use chatdesk_domain::{Appeal, AppealPatch, Chat, Page, PageRequest, SendMessage, ServerMessage};

use crate::error::ApiError;

/// Port for the appeal, message and chat endpoints.
///
/// Every call takes the bearer access token explicitly so that the caller
/// can retry with a refreshed token.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Lists appeals, optionally scoped to a tenant.
    async fn list_appeals(
        &self,
        access_token: &str,
        company_id: Option<i64>,
        page: PageRequest,
    ) -> Result<Page<Appeal>, ApiError>;

    /// Fetches one appeal.
    async fn get_appeal(&self, access_token: &str, appeal_id: i64) -> Result<Appeal, ApiError>;

    /// Applies a partial update to an appeal.
    async fn update_appeal(
        &self,
        access_token: &str,
        appeal_id: i64,
        patch: &AppealPatch,
    ) -> Result<Appeal, ApiError>;

    /// Lists the messages of an appeal.
    async fn list_messages(
        &self,
        access_token: &str,
        appeal_id: i64,
        page: PageRequest,
    ) -> Result<Page<ServerMessage>, ApiError>;

    /// Sends a message and returns the canonical record.
    async fn send_message(
        &self,
        access_token: &str,
        message: &SendMessage,
    ) -> Result<ServerMessage, ApiError>;

    /// Fetches a chat transcript.
    async fn get_chat(&self, access_token: &str, chat_id: i64) -> Result<Chat, ApiError>;
}
