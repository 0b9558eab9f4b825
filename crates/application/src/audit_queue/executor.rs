use std::sync::Arc;

use shopkeep_core::{AppError, NonEmptyString};
use shopkeep_domain::{AuditEntry, AuditRow};
use tracing::{debug, warn};

use crate::AuditSink;

/// Result of one flush attempt.
///
/// Dropped batches are not retried; callers decide whether to look at the
/// error, and detached flushes discard it.
#[must_use]
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was buffered, so no write happened.
    Empty,
    /// The sink accepted every row.
    Written {
        /// Number of rows written.
        rows: usize,
    },
    /// The sink rejected the batch and its rows were discarded.
    Dropped {
        /// Number of rows lost.
        rows: usize,
        /// Error reported by the sink.
        error: AppError,
    },
}

impl FlushOutcome {
    /// Returns how many rows were handed to the sink.
    #[must_use]
    pub fn rows(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Written { rows } | Self::Dropped { rows, .. } => *rows,
        }
    }

    /// Returns whether the batch was lost.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}

/// Turns drained batches into storage rows and performs one bulk write each.
#[derive(Clone)]
pub struct AuditFlushExecutor {
    sink: Arc<dyn AuditSink>,
    collection: NonEmptyString,
    default_user_agent: String,
    report_failures: bool,
}

impl AuditFlushExecutor {
    /// Creates an executor writing into `collection`.
    #[must_use]
    pub fn new(
        sink: Arc<dyn AuditSink>,
        collection: NonEmptyString,
        default_user_agent: String,
        report_failures: bool,
    ) -> Self {
        Self {
            sink,
            collection,
            default_user_agent,
            report_failures,
        }
    }

    /// Shapes rows in batch order.
    #[must_use]
    pub fn build_rows(&self, batch: &[AuditEntry]) -> Vec<AuditRow> {
        batch
            .iter()
            .map(|entry| AuditRow::from_entry(entry, self.default_user_agent.as_str()))
            .collect()
    }

    /// Writes one batch. Never returns an error; failures become `Dropped`.
    pub async fn execute(&self, batch: Vec<AuditEntry>) -> FlushOutcome {
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let rows = self.build_rows(&batch);
        let row_count = rows.len();

        match self.sink.write(self.collection.as_str(), &rows).await {
            Ok(()) => {
                debug!(
                    collection = %self.collection.as_str(),
                    rows = row_count,
                    "audit batch written"
                );
                FlushOutcome::Written { rows: row_count }
            }
            Err(error) => {
                if self.report_failures {
                    warn!(
                        collection = %self.collection.as_str(),
                        rows = row_count,
                        error = %error,
                        "audit batch dropped"
                    );
                }
                FlushOutcome::Dropped {
                    rows: row_count,
                    error,
                }
            }
        }
    }
}
