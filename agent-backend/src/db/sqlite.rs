use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Mutex;

pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        // Append-only per-org conversation log
        conn.execute(
            "CREATE TABLE IF NOT EXISTS onboarding_messages (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_org_created
             ON onboarding_messages (org_id, created_at)",
            [],
        )?;

        // One row per dispatch attempt
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agent_audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                message_preview TEXT NOT NULL,
                reply_preview TEXT NOT NULL,
                tool_log_excerpt TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // Identity collaborator boundary: bearer token -> tenant identity
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                org_id TEXT NOT NULL,
                email TEXT NOT NULL,
                display_name TEXT NOT NULL,
                access_token TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // Tenant-scoped state read by the context snapshot
        conn.execute(
            "CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                price REAL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS scraped_products (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                price REAL,
                confidence REAL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tenant_config (
                org_id TEXT PRIMARY KEY,
                company_name TEXT,
                website_url TEXT,
                primary_color TEXT,
                font_family TEXT,
                payment_provider TEXT,
                shipping_provider TEXT,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS feature_flags (
                org_id TEXT NOT NULL,
                feature_key TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (org_id, feature_key)
            )",
            [],
        )?;
        // Current schema name; older databases carry `price_tiers` instead
        // and the snapshot falls back to it when this table is missing.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pricing_tiers (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                min_qty INTEGER NOT NULL DEFAULT 1,
                price REAL NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS commission_rules (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                rate REAL NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parent_directories_for_the_database_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/data/agent.db");
        let db = Database::new(path.to_str().expect("utf8 path")).expect("open");

        assert!(path.exists());
        // Schema is usable immediately
        assert_eq!(db.message_count("acme").expect("count"), 0);
    }

    #[test]
    fn reopening_an_existing_database_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("agent.db");
        let url = path.to_str().expect("utf8 path");

        drop(Database::new(url).expect("first open"));
        Database::new(url).expect("second open");
    }
}
