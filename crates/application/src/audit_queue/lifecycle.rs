use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::*;

/// Host notification that execution may stop soon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The host moved to the background.
    Hidden,
    /// The host is shutting down.
    Unloading,
}

/// Broadcast hub fanning lifecycle signals out to queues.
#[derive(Clone)]
pub struct LifecycleSignals {
    sender: broadcast::Sender<LifecycleSignal>,
}

impl LifecycleSignals {
    /// Creates a hub retaining up to `capacity` undelivered signals.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a new receiver for subsequent signals.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleSignal> {
        self.sender.subscribe()
    }

    /// Broadcasts a signal and returns how many receivers got it.
    pub fn notify(&self, signal: LifecycleSignal) -> usize {
        self.sender.send(signal).unwrap_or(0)
    }

    /// Returns the number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LifecycleSignals {
    fn default() -> Self {
        Self::new(16)
    }
}

impl AuditQueue {
    /// Flushes on every lifecycle signal received from `signals`.
    ///
    /// Only the first call registers a listener; later calls drop their
    /// receiver and return `false`. The listener is aborted when the last
    /// queue handle is dropped.
    pub fn attach_lifecycle(&self, mut signals: broadcast::Receiver<LifecycleSignal>) -> bool {
        if self.inner.lifecycle_attached.swap(true, Ordering::AcqRel) {
            return false;
        }

        let queue = self.downgrade();
        let listener = self.inner.runtime.spawn(async move {
            loop {
                let trigger = match signals.recv().await {
                    Ok(signal) => FlushTrigger::Lifecycle(signal),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "lifecycle listener lagged");
                        FlushTrigger::LifecycleLagged
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(inner) = queue.upgrade() else {
                    break;
                };
                AuditQueue::from_inner(inner).flush_with(trigger);
            }
        });

        let mut state = self.lock_state();
        if state.disposed {
            listener.abort();
        } else {
            state.lifecycle_listener = Some(listener);
        }

        true
    }
}
