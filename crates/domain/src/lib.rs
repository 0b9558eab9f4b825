//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit_action;
mod audit_entry;
mod audit_row;

pub use audit_action::AuditAction;
pub use audit_entry::{AuditEntry, AuditEntryInput};
pub use audit_row::{AuditRow, serialize_snapshot};
