//! Best-effort textual summary of a tenant's current configuration state
//!
//! Rebuilt fresh on every dispatch. Each source query runs independently: a
//! failure is logged and that source renders its absent-state line, so the
//! agent always sees the complete, fixed-order set of topic headers.

use std::sync::Arc;

use crate::db::Database;

const CATALOG_LIMIT: usize = 50;

pub struct SnapshotBuilder {
    db: Arc<Database>,
}

impl SnapshotBuilder {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Render the current-state block for one org. Never fails.
    pub fn build(&self, org_id: &str) -> String {
        let mut lines: Vec<String> = Vec::new();

        // 1. Active product catalog
        match self.db.active_products(org_id, CATALOG_LIMIT) {
            Ok(items) if !items.is_empty() => {
                lines.push(format!("Product catalog ({} active):", items.len()));
                for item in items {
                    match item.price {
                        Some(price) => lines.push(format!("- {} — ${:.2}", item.name, price)),
                        None => lines.push(format!("- {} — price not set", item.name)),
                    }
                }
            }
            Ok(_) => lines.push("Product catalog: None configured yet".to_string()),
            Err(e) => {
                log::warn!("[SNAPSHOT] product query failed for {}: {}", org_id, e);
                lines.push("Product catalog: None configured yet".to_string());
            }
        }

        // 2. Scraped but not yet reviewed
        match self.db.unreviewed_scraped_products(org_id) {
            Ok(items) if !items.is_empty() => {
                let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
                lines.push(format!(
                    "Scraped products awaiting review: {} ({})",
                    items.len(),
                    names.join(", ")
                ));
            }
            Ok(_) => lines.push("Scraped products awaiting review: none".to_string()),
            Err(e) => {
                log::warn!("[SNAPSHOT] scraped query failed for {}: {}", org_id, e);
                lines.push("Scraped products awaiting review: none".to_string());
            }
        }

        // 3. Branding / payments / shipping
        let config = match self.db.get_tenant_config(org_id) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("[SNAPSHOT] tenant_config query failed for {}: {}", org_id, e);
                None
            }
        };
        match config.as_ref().and_then(|c| c.company_name.as_deref()) {
            Some(name) => {
                let mut branding = format!("Branding: company \"{}\"", name);
                if let Some(color) = config.as_ref().and_then(|c| c.primary_color.as_deref()) {
                    branding.push_str(&format!(", primary color {}", color));
                }
                if let Some(font) = config.as_ref().and_then(|c| c.font_family.as_deref()) {
                    branding.push_str(&format!(", font {}", font));
                }
                lines.push(branding);
            }
            None => lines.push("Branding: Not configured".to_string()),
        }
        match config.as_ref().and_then(|c| c.payment_provider.as_deref()) {
            Some(provider) => lines.push(format!("Payments: connected via {}", provider)),
            None => lines.push("Payments: Not configured".to_string()),
        }
        match config.as_ref().and_then(|c| c.shipping_provider.as_deref()) {
            Some(provider) => lines.push(format!("Shipping: connected via {}", provider)),
            None => lines.push("Shipping: Not configured".to_string()),
        }

        // 4. Contacts
        match self.db.contact_count(org_id) {
            Ok(count) if count > 0 => lines.push(format!("Contacts: {} imported", count)),
            Ok(_) => lines.push("Contacts: none imported".to_string()),
            Err(e) => {
                log::warn!("[SNAPSHOT] contact query failed for {}: {}", org_id, e);
                lines.push("Contacts: none imported".to_string());
            }
        }

        // 5. Feature flags
        match self.db.enabled_features(org_id) {
            Ok(features) if !features.is_empty() => {
                lines.push(format!("Enabled features: {}", features.join(", ")));
            }
            Ok(_) => lines.push("Enabled features: none enabled".to_string()),
            Err(e) => {
                log::warn!("[SNAPSHOT] feature query failed for {}: {}", org_id, e);
                lines.push("Enabled features: none enabled".to_string());
            }
        }

        // 6. Pricing tiers, with legacy schema fallback
        let tiers = self.db.pricing_tiers(org_id).or_else(|e| {
            log::debug!(
                "[SNAPSHOT] pricing_tiers query failed for {} ({}), trying legacy schema",
                org_id,
                e
            );
            self.db.pricing_tiers_legacy(org_id)
        });
        match tiers {
            Ok(tiers) if !tiers.is_empty() => {
                lines.push(format!(
                    "Pricing tiers: {} configured ({})",
                    tiers.len(),
                    tiers.join(", ")
                ));
            }
            Ok(_) => lines.push("Pricing tiers: None configured".to_string()),
            Err(e) => {
                log::warn!("[SNAPSHOT] pricing tier queries failed for {}: {}", org_id, e);
                lines.push("Pricing tiers: None configured".to_string());
            }
        }

        // 7. Commission rules
        match self.db.commission_rule_count(org_id) {
            Ok(count) if count > 0 => lines.push(format!("Commission rules: {} active", count)),
            Ok(_) => lines.push("Commission rules: None configured".to_string()),
            Err(e) => {
                log::warn!("[SNAPSHOT] commission query failed for {}: {}", org_id, e);
                lines.push("Commission rules: None configured".to_string());
            }
        }

        lines.join("\n")
    }
}
