use super::*;

impl AuditQueue {
    /// Requests a flush without waiting for the write to finish.
    pub fn flush(&self) {
        self.flush_with(FlushTrigger::Requested);
    }

    /// Flushes synchronously: waits until no batch is in flight, then writes
    /// the current buffer inline and returns its outcome.
    ///
    /// The buffer is only taken once earlier batches have finished, so batches
    /// dispatched while waiting carry entries enqueued before the forced batch.
    pub async fn flush_now(&self) -> FlushOutcome {
        let batch = loop {
            let in_flight = {
                let mut state = self.lock_state();
                state.cancel_timer();
                if state.in_flight.is_empty() {
                    break std::mem::take(&mut state.buffer);
                }
                std::mem::take(&mut state.in_flight)
            };

            for handle in in_flight {
                if let Err(error) = handle.await {
                    debug!(error = %error, "in-flight audit flush did not complete");
                }
            }
        };

        if !batch.is_empty() {
            self.inner
                .counters
                .dispatched_batches
                .fetch_add(1, Ordering::Relaxed);
        }

        let outcome = self.inner.executor.execute(batch).await;
        self.inner.counters.record(&outcome);
        outcome
    }

    /// Stops accepting entries, detaches lifecycle wiring, and drains the queue.
    pub async fn dispose(&self) -> FlushOutcome {
        let listener = {
            let mut state = self.lock_state();
            state.disposed = true;
            state.lifecycle_listener.take()
        };

        if let Some(listener) = listener {
            listener.abort();
        }

        self.flush_now().await
    }

    pub(super) fn flush_with(&self, trigger: FlushTrigger) {
        let mut state = self.lock_state();
        state.cancel_timer();
        self.dispatch_locked(&mut state, trigger);
    }

    /// Swaps the buffer out and hands the drained batch to a detached task.
    pub(super) fn dispatch_locked(&self, state: &mut QueueState, trigger: FlushTrigger) {
        if state.buffer.is_empty() {
            return;
        }

        let capacity = state.thresholds.batch_size();
        let batch = std::mem::replace(&mut state.buffer, Vec::with_capacity(capacity));
        state.in_flight.retain(|handle| !handle.is_finished());

        self.inner
            .counters
            .dispatched_batches
            .fetch_add(1, Ordering::Relaxed);
        debug!(
            trigger = trigger.as_str(),
            rows = batch.len(),
            "dispatching audit flush"
        );

        let executor = self.inner.executor.clone();
        let counters = Arc::clone(&self.inner.counters);
        let handle = self.inner.runtime.spawn(async move {
            let outcome = executor.execute(batch).await;
            counters.record(&outcome);
            // The outcome ends here; producers never observe audit loss.
        });
        state.in_flight.push(handle);
    }

    pub(super) fn arm_timer_locked(&self, state: &mut QueueState) {
        state.timer_generation = state.timer_generation.wrapping_add(1);
        let generation = state.timer_generation;
        let interval = state.thresholds.flush_interval();
        let queue = self.downgrade();

        let handle = self.inner.runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(inner) = queue.upgrade() {
                AuditQueue::from_inner(inner).fire_timer(generation);
            }
        });

        state.timer = Some(PendingTimer { generation, handle });
    }

    fn fire_timer(&self, generation: u64) {
        let mut state = self.lock_state();
        let is_current = state
            .timer
            .as_ref()
            .is_some_and(|timer| timer.generation == generation);
        if !is_current {
            return;
        }

        state.timer = None;
        self.dispatch_locked(&mut state, FlushTrigger::Timer);
    }
}
