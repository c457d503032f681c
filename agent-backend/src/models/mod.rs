pub mod audit;
pub mod identity;
pub mod message;

pub use audit::{AuditRecord, DispatchStatus};
pub use identity::{AuthedUser, TenantIdentity};
pub use message::{Attachment, DispatchResult, Message, MessageRole};
