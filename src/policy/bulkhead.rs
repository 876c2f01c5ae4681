//! Bulkhead: bounded concurrency per guarded operation.
//!
//! # Responsibilities
//! - Cap concurrent executions at `capacity`
//! - For asynchronous invocations, queue up to `queue_capacity` admissions
//!   in FIFO order; reject beyond that
//! - Release each admitted slot exactly once on every exit path
//!
//! # Design Decisions
//! - One mutex per operation guards `running` and the wait queue together so
//!   admission and release stay linearizable
//! - Synchronous acquisition never waits: at capacity it rejects immediately
//! - A permit transfers to the next live waiter on release instead of
//!   bouncing through the counter, so FIFO order holds under contention
//! - A queued waiter dropped before admission removes itself from the queue;
//!   the user operation never starts for it

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::BulkheadConfig;
use crate::observability::FaultMetrics;

/// Per-operation concurrency bound.
#[derive(Clone)]
pub struct Bulkhead {
    shared: Arc<Shared>,
}

struct Shared {
    operation: String,
    capacity: usize,
    queue_capacity: usize,
    metrics: Arc<dyn FaultMetrics>,
    next_waiter: AtomicU64,
    state: Mutex<State>,
}

struct State {
    running: usize,
    queue: VecDeque<Waiter>,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<BulkheadPermit>,
}

/// An admitted execution slot; released exactly once on drop.
pub struct BulkheadPermit {
    shared: Arc<Shared>,
    armed: bool,
}

impl Bulkhead {
    pub fn new(
        operation: impl Into<String>,
        config: &BulkheadConfig,
        metrics: Arc<dyn FaultMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                operation: operation.into(),
                capacity: config.capacity,
                queue_capacity: config.queue_capacity,
                metrics,
                next_waiter: AtomicU64::new(0),
                state: Mutex::new(State {
                    running: 0,
                    queue: VecDeque::new(),
                }),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Current number of admitted executions.
    pub fn running(&self) -> usize {
        self.shared.state.lock().expect("bulkhead mutex poisoned").running
    }

    /// Current number of queued admissions.
    pub fn queue_depth(&self) -> usize {
        self.shared
            .state
            .lock()
            .expect("bulkhead mutex poisoned")
            .queue
            .len()
    }

    /// Synchronous admission: a permit or an immediate rejection.
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        let shared = &self.shared;
        let admitted = {
            let mut state = shared.state.lock().expect("bulkhead mutex poisoned");
            if state.running < shared.capacity {
                state.running += 1;
                shared
                    .metrics
                    .record_bulkhead_running(&shared.operation, state.running);
                true
            } else {
                false
            }
        };

        shared.metrics.record_bulkhead_call(&shared.operation, admitted);
        if admitted {
            Some(BulkheadPermit {
                shared: shared.clone(),
                armed: true,
            })
        } else {
            tracing::debug!(
                operation = %shared.operation,
                capacity = shared.capacity,
                "bulkhead rejected synchronous call"
            );
            None
        }
    }

    /// Asynchronous admission: immediate when below capacity, queued FIFO up
    /// to `queue_capacity`, otherwise an immediate rejection (`None`).
    ///
    /// Dropping the returned future while queued withdraws the admission
    /// request; the slot is never consumed.
    pub async fn acquire(&self) -> Option<BulkheadPermit> {
        let shared = &self.shared;

        enum Admission {
            Immediate(BulkheadPermit),
            Queued(oneshot::Receiver<BulkheadPermit>, QueueGuard),
            Rejected,
        }

        let admission = {
            let mut state = shared.state.lock().expect("bulkhead mutex poisoned");
            if state.running < shared.capacity {
                state.running += 1;
                shared
                    .metrics
                    .record_bulkhead_running(&shared.operation, state.running);
                Admission::Immediate(BulkheadPermit {
                    shared: shared.clone(),
                    armed: true,
                })
            } else if state.queue.len() < shared.queue_capacity {
                let id = shared.next_waiter.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(Waiter { id, tx });
                shared
                    .metrics
                    .record_bulkhead_queue(&shared.operation, state.queue.len());
                Admission::Queued(
                    rx,
                    QueueGuard {
                        shared: shared.clone(),
                        id,
                        armed: true,
                    },
                )
            } else {
                Admission::Rejected
            }
        };

        match admission {
            Admission::Immediate(permit) => {
                shared.metrics.record_bulkhead_call(&shared.operation, true);
                shared
                    .metrics
                    .record_bulkhead_wait(&shared.operation, std::time::Duration::ZERO);
                Some(permit)
            }
            Admission::Rejected => {
                shared.metrics.record_bulkhead_call(&shared.operation, false);
                tracing::debug!(
                    operation = %shared.operation,
                    capacity = shared.capacity,
                    queue_capacity = shared.queue_capacity,
                    "bulkhead rejected asynchronous call"
                );
                None
            }
            Admission::Queued(rx, mut guard) => {
                let enqueued = Instant::now();
                match rx.await {
                    Ok(permit) => {
                        guard.armed = false;
                        shared.metrics.record_bulkhead_call(&shared.operation, true);
                        shared
                            .metrics
                            .record_bulkhead_wait(&shared.operation, enqueued.elapsed());
                        Some(permit)
                    }
                    // Sender dropped without a handoff: the bulkhead itself
                    // went away. Treat as rejection.
                    Err(_) => {
                        guard.armed = false;
                        shared.metrics.record_bulkhead_call(&shared.operation, false);
                        None
                    }
                }
            }
        }
    }
}

/// Withdraws a queued admission request when the waiting future is dropped.
struct QueueGuard {
    shared: Arc<Shared>,
    id: u64,
    armed: bool,
}

impl Drop for QueueGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.state.lock().expect("bulkhead mutex poisoned");
        if let Some(pos) = state.queue.iter().position(|w| w.id == self.id) {
            state.queue.remove(pos);
            self.shared
                .metrics
                .record_bulkhead_queue(&self.shared.operation, state.queue.len());
        }
        // If the waiter was already dequeued, the in-flight permit is sitting
        // in the dropped oneshot and releases itself.
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let shared = self.shared.clone();
        let mut state = shared.state.lock().expect("bulkhead mutex poisoned");
        // Hand the slot to the next live waiter; running stays unchanged.
        while let Some(waiter) = state.queue.pop_front() {
            shared
                .metrics
                .record_bulkhead_queue(&shared.operation, state.queue.len());
            let permit = BulkheadPermit {
                shared: shared.clone(),
                armed: true,
            };
            match waiter.tx.send(permit) {
                Ok(()) => return,
                Err(mut unclaimed) => {
                    // Receiver gone; neutralize the permit so it does not
                    // re-enter this lock, and try the next waiter.
                    unclaimed.armed = false;
                }
            }
        }
        state.running -= 1;
        shared
            .metrics
            .record_bulkhead_running(&shared.operation, state.running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopMetrics;

    fn bulkhead(capacity: usize, queue_capacity: usize) -> Bulkhead {
        Bulkhead::new(
            "test",
            &BulkheadConfig {
                capacity,
                queue_capacity,
            },
            Arc::new(NoopMetrics),
        )
    }

    #[test]
    fn sync_rejects_at_capacity() {
        let bh = bulkhead(2, 0);
        let p1 = bh.try_acquire().expect("first permit");
        let _p2 = bh.try_acquire().expect("second permit");
        assert!(bh.try_acquire().is_none());

        drop(p1);
        assert!(bh.try_acquire().is_some());
    }

    #[tokio::test]
    async fn async_queues_fifo_and_rejects_beyond_queue() {
        let bh = bulkhead(1, 1);
        let permit = bh.acquire().await.expect("admitted");

        let bh2 = bh.clone();
        let queued = tokio::spawn(async move { bh2.acquire().await.is_some() });
        tokio::task::yield_now().await;
        assert_eq!(bh.queue_depth(), 1);

        // Queue is full now: immediate rejection.
        assert!(bh.acquire().await.is_none());

        drop(permit);
        assert!(queued.await.unwrap());
        assert_eq!(bh.queue_depth(), 0);
        assert_eq!(bh.running(), 1);
    }

    #[tokio::test]
    async fn dropped_waiter_leaves_the_queue() {
        let bh = bulkhead(1, 2);
        let permit = bh.acquire().await.expect("admitted");

        let bh2 = bh.clone();
        let waiter = tokio::spawn(async move {
            let _ = bh2.acquire().await;
        });
        tokio::task::yield_now().await;
        assert_eq!(bh.queue_depth(), 1);

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(bh.queue_depth(), 0);

        // Slot still held by the original permit, then freed normally.
        drop(permit);
        assert_eq!(bh.running(), 0);
    }

    #[tokio::test]
    async fn release_skips_dead_waiters() {
        let bh = bulkhead(1, 2);
        let permit = bh.acquire().await.expect("admitted");

        let bh2 = bh.clone();
        let dead = tokio::spawn(async move {
            let _ = bh2.acquire().await;
        });
        let bh3 = bh.clone();
        let live = tokio::spawn(async move { bh3.acquire().await.is_some() });
        tokio::task::yield_now().await;
        assert_eq!(bh.queue_depth(), 2);

        dead.abort();
        let _ = dead.await;

        drop(permit);
        assert!(live.await.unwrap());
        assert_eq!(bh.running(), 1);
    }
}
