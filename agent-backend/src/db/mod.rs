mod sqlite;
pub mod tables;

pub use sqlite::Database;
pub use tables::tenant::{CatalogItem, TenantConfig};
