pub mod trail;

pub use trail::{AuditAction, AuditEntry, AuditRecord, AuditTrail};
