//! Identity session database operations
//!
//! Boundary to the external identity collaborator: a session row maps a
//! caller-presented bearer token to a tenant identity plus the capability
//! credential used for the optional enrichment call.

use chrono::Utc;
use rusqlite::Result as SqliteResult;

use crate::db::Database;
use crate::models::{AuthedUser, TenantIdentity};

impl Database {
    /// Resolve a bearer token to an authenticated user, or None when the
    /// token is unknown.
    pub fn resolve_identity(&self, token: &str) -> SqliteResult<Option<AuthedUser>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, org_id, email, display_name, access_token
             FROM auth_sessions WHERE token = ?1",
        )?;

        let result = stmt.query_row([token], |row| {
            Ok(AuthedUser {
                identity: TenantIdentity {
                    user_id: row.get(0)?,
                    org_id: row.get(1)?,
                    email: row.get(2)?,
                    display_name: row.get(3)?,
                },
                access_token: row.get(4)?,
            })
        });

        // Only "no such token" means unauthenticated; a real storage error
        // propagates so the caller can answer 500 instead of 401
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Register a session token for a tenant user. Called by the identity
    /// sync path, and by tests to seed identities.
    pub fn upsert_auth_session(
        &self,
        token: &str,
        identity: &TenantIdentity,
        access_token: Option<&str>,
    ) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_sessions (token, user_id, org_id, email, display_name, access_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(token) DO UPDATE SET
                user_id = excluded.user_id,
                org_id = excluded.org_id,
                email = excluded.email,
                display_name = excluded.display_name,
                access_token = excluded.access_token",
            rusqlite::params![
                token,
                &identity.user_id,
                &identity.org_id,
                &identity.email,
                &identity.display_name,
                access_token,
                &Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
