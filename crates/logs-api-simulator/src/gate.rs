//! Single-flight gate for lifecycle events.
//!
//! At most one event is outstanding at a time. A caller that asks for the
//! next event while another is held parks on a notification until the holder
//! releases. There is no fairness among waiters: whichever observes the free
//! gate first claims it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Gate state shared by every `/event/next` request of one simulator.
#[derive(Debug)]
pub struct EventGate {
    outstanding: AtomicBool,
    released: Notify,

    /// Longest a waiter sleeps before re-checking the flag on its own.
    poll_interval: Duration,
}

impl EventGate {
    /// Creates a free gate.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            outstanding: AtomicBool::new(false),
            released: Notify::new(),
            poll_interval,
        }
    }

    /// Creates a free gate wrapped in an `Arc`.
    pub fn new_shared(poll_interval: Duration) -> Arc<Self> {
        Arc::new(Self::new(poll_interval))
    }

    /// Returns `true` while an event is held.
    pub fn is_outstanding(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Claims the gate without waiting.
    pub fn try_acquire(self: &Arc<Self>) -> Option<GateGuard> {
        self.outstanding
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| GateGuard {
                gate: Arc::clone(self),
            })
    }

    /// Waits until the gate is free, then claims it.
    ///
    /// The gate is released when the returned guard is dropped. Waits forever
    /// if the current holder never lets go.
    pub async fn acquire(self: &Arc<Self>) -> GateGuard {
        loop {
            if let Some(guard) = self.try_acquire() {
                return guard;
            }

            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            // The holder may have released between the failed claim and enable().
            if let Some(guard) = self.try_acquire() {
                return guard;
            }

            let _ = tokio::time::timeout(self.poll_interval, notified).await;
        }
    }

    fn release(&self) {
        self.outstanding.store(false, Ordering::SeqCst);
        self.released.notify_one();
    }
}

impl Default for EventGate {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

/// Proof of holding the gate. Dropping it releases the gate exactly once.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard {
    gate: Arc<EventGate>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.release();
    }
}
