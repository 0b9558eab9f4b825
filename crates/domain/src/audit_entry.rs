use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Audit event payload supplied by producers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditEntryInput {
    /// Namespaced action identifier, for example `sale.delete`.
    pub action: String,
    /// Table or collection holding the affected record.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Identifier of the affected record.
    #[serde(default)]
    pub record_id: Option<String>,
    /// Snapshot of the record before the action.
    #[serde(default)]
    pub old_data: Option<Value>,
    /// Snapshot of the record after the action.
    #[serde(default)]
    pub new_data: Option<Value>,
    /// Caller IP address if known.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Caller user-agent; the queue default applies when absent.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl AuditEntryInput {
    /// Creates an input carrying only an action.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// Points the entry at one record.
    #[must_use]
    pub fn with_target(
        mut self,
        table_name: impl Into<String>,
        record_id: impl Into<String>,
    ) -> Self {
        self.table_name = Some(table_name.into());
        self.record_id = Some(record_id.into());
        self
    }

    /// Attaches the before snapshot.
    #[must_use]
    pub fn with_old_data(mut self, old_data: Value) -> Self {
        self.old_data = Some(old_data);
        self
    }

    /// Attaches the after snapshot.
    #[must_use]
    pub fn with_new_data(mut self, new_data: Value) -> Self {
        self.new_data = Some(new_data);
        self
    }

    /// Attaches caller network context.
    #[must_use]
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// One queued audit event.
///
/// Built once at enqueue time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    entry_id: Uuid,
    acting_user_id: Option<String>,
    input: AuditEntryInput,
    queued_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry stamped with a fresh identifier and the current time.
    #[must_use]
    pub fn new(acting_user_id: Option<String>, input: AuditEntryInput) -> Self {
        Self::with_identity(Uuid::new_v4(), acting_user_id, input, Utc::now())
    }

    /// Creates an entry from already-known identity and timestamp.
    #[must_use]
    pub fn with_identity(
        entry_id: Uuid,
        acting_user_id: Option<String>,
        input: AuditEntryInput,
        queued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id,
            acting_user_id,
            input,
            queued_at,
        }
    }

    /// Returns the stable entry identifier.
    #[must_use]
    pub fn entry_id(&self) -> Uuid {
        self.entry_id
    }

    /// Returns the acting user, or `None` for system events.
    #[must_use]
    pub fn acting_user_id(&self) -> Option<&str> {
        self.acting_user_id.as_deref()
    }

    /// Returns the action identifier.
    #[must_use]
    pub fn action(&self) -> &str {
        self.input.action.as_str()
    }

    /// Returns the affected table name.
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        self.input.table_name.as_deref()
    }

    /// Returns the affected record identifier.
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        self.input.record_id.as_deref()
    }

    /// Returns the before snapshot.
    #[must_use]
    pub fn old_data(&self) -> Option<&Value> {
        self.input.old_data.as_ref()
    }

    /// Returns the after snapshot.
    #[must_use]
    pub fn new_data(&self) -> Option<&Value> {
        self.input.new_data.as_ref()
    }

    /// Returns the caller IP address.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.input.ip_address.as_deref()
    }

    /// Returns the caller-supplied user-agent.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.input.user_agent.as_deref()
    }

    /// Returns when the entry was enqueued.
    #[must_use]
    pub fn queued_at(&self) -> DateTime<Utc> {
        self.queued_at
    }
}
