use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Success,
    Timeout,
    Error,
    RateLimited,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Success => "success",
            DispatchStatus::Timeout => "timeout",
            DispatchStatus::Error => "error",
            DispatchStatus::RateLimited => "rate_limited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(DispatchStatus::Success),
            "timeout" => Some(DispatchStatus::Timeout),
            "error" => Some(DispatchStatus::Error),
            "rate_limited" => Some(DispatchStatus::RateLimited),
            _ => None,
        }
    }
}

/// Write-once record of one dispatch attempt. Best effort: writing it must
/// never block or alter the dispatch outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub org_id: String,
    pub user_id: String,
    pub message_preview: String,
    pub reply_preview: String,
    pub tool_log_excerpt: String,
    pub duration_ms: i64,
    pub status: DispatchStatus,
    pub created_at: DateTime<Utc>,
}
