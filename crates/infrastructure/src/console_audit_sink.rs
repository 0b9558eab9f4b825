//! Console audit sink for development. Logs audit rows to tracing output.

use async_trait::async_trait;
use shopkeep_application::AuditSink;
use shopkeep_core::{AppError, AppResult};
use shopkeep_domain::AuditRow;
use tracing::info;

/// Development audit sink that logs rows to the console.
#[derive(Clone)]
pub struct ConsoleAuditSink;

impl ConsoleAuditSink {
    /// Creates a new console audit sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for ConsoleAuditSink {
    async fn write(&self, collection: &str, rows: &[AuditRow]) -> AppResult<()> {
        for row in rows {
            let payload = serde_json::to_string(row).map_err(|error| {
                AppError::Internal(format!("failed to render audit row {}: {error}", row.id))
            })?;

            info!(
                collection = collection,
                action = %row.action,
                user_id = row.user_id.as_deref().unwrap_or("<system>"),
                "audit row (console): {payload}"
            );
        }

        Ok(())
    }
}
