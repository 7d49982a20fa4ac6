//! Appeal (support conversation) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::ServerMessage;

/// A customer-support conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    /// Appeal id.
    pub id: i64,
    /// Owning tenant.
    #[serde(default)]
    pub company_id: Option<i64>,
    /// Workflow status (`new`, `in_progress`, `closed`...).
    #[serde(default)]
    pub status: Option<String>,
    /// Customer display name.
    #[serde(default)]
    pub client_name: Option<String>,
    /// Inbound channel the conversation came from.
    #[serde(default)]
    pub channel: Option<String>,
    /// Operator currently handling the appeal.
    #[serde(default)]
    pub operator_id: Option<i64>,
    /// Whether the bot still answers automatically.
    #[serde(default)]
    pub is_bot_active: Option<bool>,
    /// Unread message counter.
    #[serde(default)]
    pub unread_count: u32,
    /// Preview of the latest message.
    #[serde(default)]
    pub last_message: Option<String>,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appeal {
    /// Merges the fields present in `patch` into this record.
    pub fn merge(&mut self, patch: &AppealPatch) {
        if let Some(status) = &patch.status {
            self.status = Some(status.clone());
        }
        if let Some(client_name) = &patch.client_name {
            self.client_name = Some(client_name.clone());
        }
        if let Some(operator_id) = patch.operator_id {
            self.operator_id = Some(operator_id);
        }
        if let Some(is_bot_active) = patch.is_bot_active {
            self.is_bot_active = Some(is_bot_active);
        }
        if let Some(unread_count) = patch.unread_count {
            self.unread_count = unread_count;
        }
        if let Some(last_message) = &patch.last_message {
            self.last_message = Some(last_message.clone());
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = Some(updated_at);
        }
    }
}

/// Partial appeal update, used both for `PATCH` bodies and realtime pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppealPatch {
    /// Appeal being updated. Required for realtime pushes, ignored in `PATCH` bodies.
    #[serde(default, alias = "appeal_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// New customer name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// New operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<i64>,
    /// Bot on/off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bot_active: Option<bool>,
    /// New unread counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
    /// New latest-message preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    /// Modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AppealPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }
}

/// A chat transcript attached to an appeal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Chat id.
    pub id: i64,
    /// Appeal the chat belongs to.
    #[serde(default)]
    pub appeal_id: Option<i64>,
    /// Chat title.
    #[serde(default)]
    pub title: Option<String>,
    /// Messages in the chat.
    #[serde(default)]
    pub messages: Vec<ServerMessage>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_only_touches_present_fields() {
        let mut appeal: Appeal = serde_json::from_value(serde_json::json!({
            "id": 1, "status": "new", "client_name": "Bob", "unread_count": 3
        }))
        .unwrap();

        appeal.merge(&AppealPatch {
            id: Some(1),
            status: Some("in_progress".to_string()),
            unread_count: Some(0),
            ..AppealPatch::default()
        });

        assert_eq!(appeal.status.as_deref(), Some("in_progress"));
        assert_eq!(appeal.client_name.as_deref(), Some("Bob"));
        assert_eq!(appeal.unread_count, 0);
    }

    #[test]
    fn test_patch_body_omits_absent_fields() {
        let body = serde_json::to_value(AppealPatch::status("closed")).unwrap();
        assert_eq!(body, serde_json::json!({"status": "closed"}));
    }
}
