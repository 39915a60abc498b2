//! The event cycle behind `/event/next`.
//!
//! Each call claims the [`EventGate`], builds the next lifecycle event and
//! hands the rest of the cycle (simulated work, buffering, delivery) to a
//! background task that owns the gate guard. The caller gets the event
//! straight away; the next caller waits until that task has finished and the
//! guard is dropped.

use crate::delivery::{DeliveryOutcome, LogSink};
use crate::error::DeliveryError;
use crate::extension::{LifecycleEvent, ShutdownReason};
use crate::gate::{EventGate, GateGuard};
use crate::generator::EventGenerator;
use crate::log_buffer::LogBuffer;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, Notify};

/// Runs event cycles against one simulator's shared state.
#[derive(Debug)]
pub struct EventDispatcher {
    gate: Arc<EventGate>,
    generator: EventGenerator,
    buffer: Arc<LogBuffer>,
    sink: Arc<LogSink>,

    /// Shutdown to hand out on the next cycle instead of an INVOKE.
    pending_shutdown: Mutex<Option<ShutdownReason>>,

    /// Number of cycles whose background work has finished.
    completed_cycles: AtomicU64,

    /// Notified after each cycle finishes and the gate is released.
    cycle_completed: Notify,
}

impl EventDispatcher {
    /// Creates a dispatcher over the given shared state.
    pub fn new(
        gate: Arc<EventGate>,
        generator: EventGenerator,
        buffer: Arc<LogBuffer>,
        sink: Arc<LogSink>,
    ) -> Self {
        Self {
            gate,
            generator,
            buffer,
            sink,
            pending_shutdown: Mutex::new(None),
            completed_cycles: AtomicU64::new(0),
            cycle_completed: Notify::new(),
        }
    }

    /// The gate guarding this dispatcher's cycles.
    pub fn gate(&self) -> &Arc<EventGate> {
        &self.gate
    }

    /// The buffer cycles append to.
    pub fn buffer(&self) -> &Arc<LogBuffer> {
        &self.buffer
    }

    /// The sink cycles deliver through.
    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    /// Number of cycles that have run to completion.
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` cycles have completed.
    pub async fn wait_for_completed_cycles(&self, count: u64) {
        loop {
            let notified = self.cycle_completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.completed_cycles() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Makes the next cycle hand out a SHUTDOWN event.
    ///
    /// The request is consumed by that cycle; later polls get INVOKE events again.
    pub async fn request_shutdown(&self, reason: ShutdownReason) {
        *self.pending_shutdown.lock().await = Some(reason);
    }

    /// Returns `true` while a requested shutdown has not been handed out yet.
    pub async fn is_shutdown_pending(&self) -> bool {
        self.pending_shutdown.lock().await.is_some()
    }

    /// Waits for the gate, then returns the next lifecycle event.
    ///
    /// The remainder of the cycle runs in a spawned task which releases the
    /// gate when it finishes.
    pub async fn next_event(self: &Arc<Self>) -> LifecycleEvent {
        let guard = self.gate.acquire().await;
        let shutdown = self.pending_shutdown.lock().await.take();
        let dispatcher = Arc::clone(self);

        match shutdown {
            Some(reason) => {
                let event = self.generator.shutdown_event(reason);
                tracing::info!(target: "lambda_lifecycle", "🛑 Dispatching SHUTDOWN ({:?})", reason);
                tokio::spawn(async move { dispatcher.finish_shutdown(guard).await });
                event
            }
            None => {
                let event = self.generator.next_invocation_event();
                tracing::info!(
                    target: "lambda_lifecycle",
                    "📨 Dispatching INVOKE: {}",
                    event.request_id().unwrap_or_default()
                );
                tokio::spawn(async move { dispatcher.finish_invocation(guard).await });
                event
            }
        }
    }

    async fn finish_invocation(&self, guard: GateGuard) {
        let records = self.generator.simulate_work().await;
        tracing::debug!(count = records.len(), "Function work produced logs");
        self.buffer.append(records).await;

        log_delivery_result(self.sink.maybe_deliver(&self.buffer).await);
        self.complete_cycle(guard);
    }

    async fn finish_shutdown(&self, guard: GateGuard) {
        log_delivery_result(self.sink.flush(&self.buffer).await);
        self.complete_cycle(guard);
    }

    fn complete_cycle(&self, guard: GateGuard) {
        drop(guard);
        self.completed_cycles.fetch_add(1, Ordering::SeqCst);
        self.cycle_completed.notify_waiters();
    }
}

fn log_delivery_result(result: Result<DeliveryOutcome, DeliveryError>) {
    match result {
        Ok(DeliveryOutcome::Delivered { records }) => {
            tracing::info!(target: "lambda_lifecycle", "📤 Delivered {} log records", records);
        }
        Ok(DeliveryOutcome::Skipped) => {}
        Err(DeliveryError::ConfigurationNotSet) => {
            tracing::debug!("Skipping log delivery, no destination configured");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Log delivery failed, records kept for the next cycle");
        }
    }
}
