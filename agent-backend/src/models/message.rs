use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }

    /// Label used when rendering conversation history into the agent prompt
    pub fn prompt_label(&self) -> &'static str {
        match self {
            MessageRole::User => "Merchant",
            MessageRole::Assistant => "Assistant",
        }
    }
}

/// One row in the append-only per-org conversation log
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub org_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a new message with a freshly generated id.
    /// The id is generated before persistence so the orchestrator knows it
    /// prior to invoking the agent.
    pub fn new(org_id: &str, user_id: &str, role: MessageRole, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// File reference supplied by the caller per request. Never persisted,
/// only rendered into the assembled prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

/// Returned to the request layer after a completed dispatch
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub reply_text: String,
    pub message_id: String,
}
