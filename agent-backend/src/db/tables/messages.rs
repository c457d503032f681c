//! Conversation log database operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

use crate::db::Database;
use crate::models::{Message, MessageRole};

impl Database {
    /// Append one message to the org's conversation log.
    /// The log is append-only; there are no update or delete operations.
    pub fn append_message(&self, msg: &Message) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO onboarding_messages (id, org_id, user_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                &msg.id,
                &msg.org_id,
                &msg.user_id,
                msg.role.as_str(),
                &msg.content,
                &msg.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The most recent `limit` messages for an org, in creation order.
    pub fn recent_messages(&self, org_id: &str, limit: usize) -> SqliteResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, org_id, user_id, role, content, created_at
             FROM onboarding_messages WHERE org_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;

        let mut messages: Vec<Message> = stmt
            .query_map(rusqlite::params![org_id, limit as i64], row_to_message)?
            .filter_map(|r| r.ok())
            .collect();

        // Query runs newest-first so LIMIT keeps the tail of the log
        messages.reverse();
        Ok(messages)
    }

    /// Count of stored messages for an org (used by tests and diagnostics).
    pub fn message_count(&self, org_id: &str) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM onboarding_messages WHERE org_id = ?1",
            [org_id],
            |row| row.get(0),
        )
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role_str: String = row.get(3)?;
    let created_at_str: String = row.get(5)?;

    Ok(Message {
        id: row.get(0)?,
        org_id: row.get(1)?,
        user_id: row.get(2)?,
        role: MessageRole::parse(&role_str).unwrap_or(MessageRole::User),
        content: row.get(4)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::models::{Message, MessageRole};

    #[test]
    fn append_and_read_back_in_order() {
        let db = Database::new(":memory:").expect("in-memory db");

        for i in 0..5 {
            let mut msg = Message::new("org-a", "user-1", MessageRole::User, &format!("msg {}", i));
            // Force distinct timestamps so ordering is deterministic
            msg.created_at = msg.created_at + chrono::Duration::milliseconds(i);
            db.append_message(&msg).expect("append");
        }

        let messages = db.recent_messages("org-a", 3).expect("read");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "msg 2");
        assert_eq!(messages[2].content, "msg 4");
    }

    #[test]
    fn messages_are_org_scoped() {
        let db = Database::new(":memory:").expect("in-memory db");

        db.append_message(&Message::new("org-a", "u1", MessageRole::User, "hello"))
            .expect("append");
        db.append_message(&Message::new("org-b", "u2", MessageRole::User, "world"))
            .expect("append");

        let a = db.recent_messages("org-a", 20).expect("read");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "hello");
        assert_eq!(db.message_count("org-b").expect("count"), 1);
    }
}
