//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod audit;      // agent_audit_log
mod messages;   // onboarding_messages
mod sessions;   // auth_sessions
pub mod tenant; // products, scraped_products, tenant_config, contacts,
                // feature_flags, pricing_tiers, commission_rules
