//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_audit_sink;
mod http_audit_sink;
mod postgres_audit_sink;
mod process_lifecycle_signals;

pub use console_audit_sink::ConsoleAuditSink;
pub use http_audit_sink::HttpAuditSink;
pub use postgres_audit_sink::{PostgresAuditSink, run_migrations};
pub use process_lifecycle_signals::spawn_process_signal_forwarder;
