//! Dispatch audit log database operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

use crate::db::Database;
use crate::models::{AuditRecord, DispatchStatus};

impl Database {
    pub fn insert_audit_record(&self, record: &AuditRecord) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_audit_log
             (org_id, user_id, message_preview, reply_preview, tool_log_excerpt, duration_ms, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                &record.org_id,
                &record.user_id,
                &record.message_preview,
                &record.reply_preview,
                &record.tool_log_excerpt,
                record.duration_ms,
                record.status.as_str(),
                &record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The most recent audit rows for an org, newest first.
    pub fn list_audit_records(&self, org_id: &str, limit: usize) -> SqliteResult<Vec<AuditRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT org_id, user_id, message_preview, reply_preview, tool_log_excerpt, duration_ms, status, created_at
             FROM agent_audit_log WHERE org_id = ?1
             ORDER BY id DESC LIMIT ?2",
        )?;

        let records = stmt
            .query_map(rusqlite::params![org_id, limit as i64], |row| {
                let status_str: String = row.get(6)?;
                let created_at_str: String = row.get(7)?;
                Ok(AuditRecord {
                    org_id: row.get(0)?,
                    user_id: row.get(1)?,
                    message_preview: row.get(2)?,
                    reply_preview: row.get(3)?,
                    tool_log_excerpt: row.get(4)?,
                    duration_ms: row.get(5)?,
                    status: DispatchStatus::parse(&status_str).unwrap_or(DispatchStatus::Error),
                    created_at: DateTime::parse_from_rfc3339(&created_at_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }
}
