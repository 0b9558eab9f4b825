//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_queue;
mod audit_sink;

pub use audit_queue::{
    AuditFlushExecutor, AuditQueue, AuditQueueOptions, AuditQueueStats, AuditQueueThresholds,
    DEFAULT_AUDIT_COLLECTION, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS, FlushOutcome,
    FlushTrigger, LifecycleSignal, LifecycleSignals, ThresholdOverrides, client_context,
    default_client_context,
};
pub use audit_sink::AuditSink;
