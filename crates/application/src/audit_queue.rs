//! Write-batching queue for audit events.
//!
//! Producers call [`AuditQueue::enqueue`], which never blocks and never fails.
//! Buffered entries are flushed to an [`AuditSink`] in one bulk write when the
//! buffer reaches the batch size, when the debounce timer fires, when a
//! lifecycle signal arrives, or when a flush is requested explicitly. Delivery
//! is best-effort: a batch the sink rejects is dropped, not re-queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use shopkeep_core::{AppError, AppResult};
use shopkeep_domain::{AuditEntry, AuditEntryInput};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::AuditSink;

mod config;
mod executor;
mod flush;
mod lifecycle;


pub use config::{
    AuditQueueOptions, AuditQueueThresholds, DEFAULT_AUDIT_COLLECTION, DEFAULT_BATCH_SIZE,
    DEFAULT_FLUSH_INTERVAL_MS, ThresholdOverrides, client_context, default_client_context,
};
pub use executor::{AuditFlushExecutor, FlushOutcome};
pub use lifecycle::{LifecycleSignal, LifecycleSignals};

/// Reason a flush was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The buffer reached the batch size.
    BatchSize,
    /// The debounce interval elapsed.
    Timer,
    /// The host is being hidden or unloaded.
    Lifecycle(LifecycleSignal),
    /// The lifecycle receiver missed signals.
    LifecycleLagged,
    /// A caller asked for an early flush.
    Requested,
}

impl FlushTrigger {
    /// Returns a stable label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatchSize => "batch_size",
            Self::Timer => "timer",
            Self::Lifecycle(LifecycleSignal::Hidden) => "lifecycle.hidden",
            Self::Lifecycle(LifecycleSignal::Unloading) => "lifecycle.unloading",
            Self::LifecycleLagged => "lifecycle.lagged",
            Self::Requested => "requested",
        }
    }
}

/// Point-in-time counters for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditQueueStats {
    /// Entries waiting in the buffer.
    pub pending: usize,
    /// Entries accepted since creation.
    pub enqueued: u64,
    /// Non-empty batches handed to the executor.
    pub dispatched_batches: u64,
    /// Rows the sink accepted.
    pub written_rows: u64,
    /// Rows lost to sink failures.
    pub dropped_rows: u64,
}

#[derive(Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    dispatched_batches: AtomicU64,
    written_rows: AtomicU64,
    dropped_rows: AtomicU64,
}

impl QueueCounters {
    fn record(&self, outcome: &FlushOutcome) {
        let rows = u64::try_from(outcome.rows()).unwrap_or(u64::MAX);
        match outcome {
            FlushOutcome::Empty => {}
            FlushOutcome::Written { .. } => {
                self.written_rows.fetch_add(rows, Ordering::Relaxed);
            }
            FlushOutcome::Dropped { .. } => {
                self.dropped_rows.fetch_add(rows, Ordering::Relaxed);
            }
        }
    }
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct QueueState {
    buffer: Vec<AuditEntry>,
    thresholds: AuditQueueThresholds,
    timer: Option<PendingTimer>,
    timer_generation: u64,
    in_flight: Vec<JoinHandle<()>>,
    lifecycle_listener: Option<JoinHandle<()>>,
    disposed: bool,
}

impl QueueState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    executor: AuditFlushExecutor,
    counters: Arc<QueueCounters>,
    runtime: Handle,
    lifecycle_attached: AtomicBool,
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        state.cancel_timer();
        if let Some(listener) = state.lifecycle_listener.take() {
            listener.abort();
        }
    }
}

/// Cloneable handle to one audit write-batching queue.
///
/// Every clone shares the same buffer. Independent queues can coexist.
#[derive(Clone)]
pub struct AuditQueue {
    inner: Arc<QueueInner>,
}

impl AuditQueue {
    /// Creates a queue bound to the current tokio runtime.
    pub fn create(sink: Arc<dyn AuditSink>, options: AuditQueueOptions) -> AppResult<Self> {
        let runtime = Handle::try_current().map_err(|error| {
            AppError::Internal(format!("audit queue requires a tokio runtime: {error}"))
        })?;

        let executor = AuditFlushExecutor::new(
            sink,
            options.collection,
            options.default_user_agent,
            options.report_failures,
        );

        Ok(Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    buffer: Vec::with_capacity(options.thresholds.batch_size()),
                    thresholds: options.thresholds,
                    timer: None,
                    timer_generation: 0,
                    in_flight: Vec::new(),
                    lifecycle_listener: None,
                    disposed: false,
                }),
                executor,
                counters: Arc::new(QueueCounters::default()),
                runtime,
                lifecycle_attached: AtomicBool::new(false),
            }),
        })
    }

    /// Appends one audit entry.
    ///
    /// Reaching the batch size cancels the debounce timer and dispatches a
    /// flush; otherwise the timer is armed if none is pending.
    pub fn enqueue(&self, acting_user_id: Option<&str>, input: AuditEntryInput) {
        let entry = AuditEntry::new(acting_user_id.map(str::to_owned), input);
        let mut state = self.lock_state();

        if state.disposed {
            debug!(action = %entry.action(), "audit queue disposed, entry discarded");
            return;
        }

        state.buffer.push(entry);
        self.inner.counters.enqueued.fetch_add(1, Ordering::Relaxed);

        if state.buffer.len() >= state.thresholds.batch_size() {
            state.cancel_timer();
            self.dispatch_locked(&mut state, FlushTrigger::BatchSize);
        } else if state.timer.is_none() {
            self.arm_timer_locked(&mut state);
        }
    }

    /// Changes thresholds for subsequent enqueues.
    pub fn configure(&self, overrides: ThresholdOverrides) {
        self.lock_state().thresholds.apply(overrides);
    }

    /// Returns the active thresholds.
    #[must_use]
    pub fn thresholds(&self) -> AuditQueueThresholds {
        self.lock_state().thresholds
    }

    /// Returns how many entries are waiting in the buffer.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock_state().buffer.len()
    }

    /// Returns a snapshot of the queue counters.
    #[must_use]
    pub fn stats(&self) -> AuditQueueStats {
        let pending = self.pending_len();
        let counters = &self.inner.counters;

        AuditQueueStats {
            pending,
            enqueued: counters.enqueued.load(Ordering::Relaxed),
            dispatched_batches: counters.dispatched_batches.load(Ordering::Relaxed),
            written_rows: counters.written_rows.load(Ordering::Relaxed),
            dropped_rows: counters.dropped_rows.load(Ordering::Relaxed),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn downgrade(&self) -> Weak<QueueInner> {
        Arc::downgrade(&self.inner)
    }

    fn from_inner(inner: Arc<QueueInner>) -> Self {
        Self { inner }
    }
}
