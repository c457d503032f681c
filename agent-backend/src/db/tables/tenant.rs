//! Tenant-scoped state queries backing the context snapshot
//!
//! Every read here is keyed by org_id. The snapshot builder wraps each of
//! these independently, so a failure in one source never hides the others.

use chrono::Utc;
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use crate::db::Database;

/// Branding / payment / shipping configuration for one org
#[derive(Debug, Clone, Default)]
pub struct TenantConfig {
    pub company_name: Option<String>,
    pub website_url: Option<String>,
    pub primary_color: Option<String>,
    pub font_family: Option<String>,
    pub payment_provider: Option<String>,
    pub shipping_provider: Option<String>,
}

/// One entry in the active product catalog
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub name: String,
    pub price: Option<f64>,
}

impl Database {
    /// Active catalog entries, newest first, capped at `limit`.
    pub fn active_products(&self, org_id: &str, limit: usize) -> SqliteResult<Vec<CatalogItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, price FROM products
             WHERE org_id = ?1 AND active = 1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let items = stmt
            .query_map(rusqlite::params![org_id, limit as i64], |row| {
                Ok(CatalogItem {
                    name: row.get(0)?,
                    price: row.get(1)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(items)
    }

    pub fn active_product_count(&self, org_id: &str) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM products WHERE org_id = ?1 AND active = 1",
            [org_id],
            |row| row.get(0),
        )
    }

    /// Scraped-but-unreviewed products (pending or approved, not yet imported).
    pub fn unreviewed_scraped_products(&self, org_id: &str) -> SqliteResult<Vec<CatalogItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, price FROM scraped_products
             WHERE org_id = ?1 AND status IN ('pending', 'approved')
             ORDER BY confidence DESC",
        )?;
        let items = stmt
            .query_map([org_id], |row| {
                Ok(CatalogItem {
                    name: row.get(0)?,
                    price: row.get(1)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(items)
    }

    pub fn scraped_product_count(&self, org_id: &str) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM scraped_products WHERE org_id = ?1",
            [org_id],
            |row| row.get(0),
        )
    }

    pub fn get_tenant_config(&self, org_id: &str) -> SqliteResult<Option<TenantConfig>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT company_name, website_url, primary_color, font_family,
                    payment_provider, shipping_provider
             FROM tenant_config WHERE org_id = ?1",
        )?;
        let config = stmt
            .query_row([org_id], |row| {
                Ok(TenantConfig {
                    company_name: row.get(0)?,
                    website_url: row.get(1)?,
                    primary_color: row.get(2)?,
                    font_family: row.get(3)?,
                    payment_provider: row.get(4)?,
                    shipping_provider: row.get(5)?,
                })
            })
            .ok();
        Ok(config)
    }

    pub fn contact_count(&self, org_id: &str) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM contacts WHERE org_id = ?1",
            [org_id],
            |row| row.get(0),
        )
    }

    pub fn enabled_features(&self, org_id: &str) -> SqliteResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT feature_key FROM feature_flags
             WHERE org_id = ?1 AND enabled = 1 ORDER BY feature_key",
        )?;
        let features = stmt
            .query_map([org_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(features)
    }

    /// Pricing tier names from the current schema. Errors when the table is
    /// missing (older databases); callers fall back to [`Self::pricing_tiers_legacy`].
    pub fn pricing_tiers(&self, org_id: &str) -> SqliteResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name FROM pricing_tiers WHERE org_id = ?1 ORDER BY min_qty",
        )?;
        let tiers = stmt
            .query_map([org_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tiers)
    }

    /// Alternate schema name used before the pricing_tiers rename.
    pub fn pricing_tiers_legacy(&self, org_id: &str) -> SqliteResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT name FROM price_tiers WHERE org_id = ?1 ORDER BY min_qty")?;
        let tiers = stmt
            .query_map([org_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tiers)
    }

    pub fn commission_rule_count(&self, org_id: &str) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM commission_rules WHERE org_id = ?1 AND active = 1",
            [org_id],
            |row| row.get(0),
        )
    }

    // ============================================
    // Write paths used by provisioning and tests
    // ============================================

    pub fn insert_product(&self, org_id: &str, name: &str, price: Option<f64>) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO products (id, org_id, name, price, active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                org_id,
                name,
                price,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn insert_scraped_product(
        &self,
        org_id: &str,
        name: &str,
        price: Option<f64>,
        confidence: Option<f64>,
    ) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scraped_products (id, org_id, name, price, confidence, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                org_id,
                name,
                price,
                confidence,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn upsert_tenant_config(&self, org_id: &str, config: &TenantConfig) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tenant_config
             (org_id, company_name, website_url, primary_color, font_family,
              payment_provider, shipping_provider, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(org_id) DO UPDATE SET
                company_name = excluded.company_name,
                website_url = excluded.website_url,
                primary_color = excluded.primary_color,
                font_family = excluded.font_family,
                payment_provider = excluded.payment_provider,
                shipping_provider = excluded.shipping_provider,
                updated_at = excluded.updated_at",
            rusqlite::params![
                org_id,
                &config.company_name,
                &config.website_url,
                &config.primary_color,
                &config.font_family,
                &config.payment_provider,
                &config.shipping_provider,
                &Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_contact(&self, org_id: &str, name: &str, email: Option<&str>) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO contacts (id, org_id, name, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                org_id,
                name,
                email,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn set_feature_flag(&self, org_id: &str, feature_key: &str, enabled: bool) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO feature_flags (org_id, feature_key, enabled) VALUES (?1, ?2, ?3)
             ON CONFLICT(org_id, feature_key) DO UPDATE SET enabled = excluded.enabled",
            rusqlite::params![org_id, feature_key, if enabled { 1 } else { 0 }],
        )?;
        Ok(())
    }

    pub fn insert_pricing_tier(&self, org_id: &str, name: &str, min_qty: i64, price: f64) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO pricing_tiers (id, org_id, name, min_qty, price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![Uuid::new_v4().to_string(), org_id, name, min_qty, price],
        )?;
        Ok(())
    }

    pub fn insert_commission_rule(&self, org_id: &str, name: &str, rate: f64) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO commission_rules (id, org_id, name, rate, active)
             VALUES (?1, ?2, ?3, ?4, 1)",
            rusqlite::params![Uuid::new_v4().to_string(), org_id, name, rate],
        )?;
        Ok(())
    }

    /// Run a raw statement. Test-only: used to simulate legacy schemas.
    #[cfg(test)]
    pub fn execute_raw(&self, sql: &str) -> SqliteResult<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(sql, [])
    }
}
