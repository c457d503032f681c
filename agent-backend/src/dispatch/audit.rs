//! Best-effort audit trail of dispatch attempts
//!
//! One record per attempt, whatever the outcome. A failed write is logged
//! and discarded; it never propagates into the dispatch result.

use chrono::Utc;
use std::sync::Arc;

use crate::db::Database;
use crate::models::{AuditRecord, DispatchStatus};

/// Fixed contract values, not configurable per record
const PREVIEW_LIMIT: usize = 200;
const TRACE_EXCERPT_LIMIT: usize = 2000;

pub struct AuditRecorder {
    db: Arc<Database>,
}

impl AuditRecorder {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn record(
        &self,
        org_id: &str,
        user_id: &str,
        message: &str,
        reply: &str,
        tool_log: &str,
        duration_ms: i64,
        status: DispatchStatus,
    ) {
        let record = AuditRecord {
            org_id: org_id.to_string(),
            user_id: user_id.to_string(),
            message_preview: truncate(message, PREVIEW_LIMIT),
            reply_preview: truncate(reply, PREVIEW_LIMIT),
            tool_log_excerpt: truncate(tool_log, TRACE_EXCERPT_LIMIT),
            duration_ms,
            status,
            created_at: Utc::now(),
        };

        if let Err(e) = self.db.insert_audit_record(&record) {
            log::error!(
                "[AUDIT] failed to record {} dispatch for org {}: {}",
                status.as_str(),
                org_id,
                e
            );
        }
    }
}

/// Char-boundary-safe truncation
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_written_with_truncated_previews() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let recorder = AuditRecorder::new(db.clone());

        let long_message = "x".repeat(500);
        recorder.record(
            "acme",
            "u1",
            &long_message,
            "short reply",
            "trace line",
            1234,
            DispatchStatus::Success,
        );

        let records = db.list_audit_records("acme", 10).expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message_preview.len(), 200);
        assert_eq!(records[0].reply_preview, "short reply");
        assert_eq!(records[0].duration_ms, 1234);
        assert_eq!(records[0].status, DispatchStatus::Success);
    }

    #[test]
    fn truncate_respects_multibyte_chars() {
        let text = "é".repeat(10);
        assert_eq!(truncate(&text, 3), "ééé");
    }
}
