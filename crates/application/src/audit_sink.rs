use async_trait::async_trait;

use shopkeep_core::AppResult;
use shopkeep_domain::AuditRow;

/// Port for bulk-writing audit rows to persistent storage.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Inserts every row into `collection` as one bulk write.
    async fn write(&self, collection: &str, rows: &[AuditRow]) -> AppResult<()>;
}
