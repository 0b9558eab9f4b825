use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::AuditEntry;

/// Storage row written for one audit entry.
///
/// Absent values stay `None` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    /// Entry identifier, unique per row.
    pub id: Uuid,
    /// Acting user identifier.
    pub user_id: Option<String>,
    /// Namespaced action identifier.
    pub action: String,
    /// Affected table name.
    pub table_name: Option<String>,
    /// Affected record identifier.
    pub record_id: Option<String>,
    /// Serialized before snapshot.
    pub old_data: Option<String>,
    /// Serialized after snapshot.
    pub new_data: Option<String>,
    /// Caller IP address.
    pub ip_address: Option<String>,
    /// Caller user-agent or the configured default client context.
    pub user_agent: String,
    /// Enqueue timestamp.
    pub created_at: DateTime<Utc>,
}

impl AuditRow {
    /// Shapes a storage row from a queued entry.
    #[must_use]
    pub fn from_entry(entry: &AuditEntry, default_user_agent: &str) -> Self {
        Self {
            id: entry.entry_id(),
            user_id: entry.acting_user_id().map(str::to_owned),
            action: entry.action().to_owned(),
            table_name: entry.table_name().map(str::to_owned),
            record_id: entry.record_id().map(str::to_owned),
            old_data: serialize_snapshot(entry.old_data()),
            new_data: serialize_snapshot(entry.new_data()),
            ip_address: entry.ip_address().map(str::to_owned),
            user_agent: entry
                .user_agent()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(default_user_agent)
                .to_owned(),
            created_at: entry.queued_at(),
        }
    }
}

/// Serializes a snapshot to compact JSON. A JSON `null` counts as absent.
#[must_use]
pub fn serialize_snapshot(snapshot: Option<&Value>) -> Option<String> {
    snapshot
        .filter(|value| !value.is_null())
        .map(Value::to_string)
}
