//! Asynchronous execution handles.
//!
//! # Responsibilities
//! - Represent a pending or completed asynchronous guarded invocation
//! - Support idempotent cancellation before or during execution
//!
//! # Design Decisions
//! - Cancellation aborts the chain task; dropping the chain future unwinds
//!   every layer (queued bulkhead entries withdraw, held permits release)
//! - A task cancelled before its first poll never invokes the user operation
//! - `is_done` reflects the terminal outcome of the actual inner future, not
//!   merely a method return

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::FaultError;

/// Handle to a guarded invocation running on a worker task.
///
/// Awaiting the handle yields the terminal outcome; `Cancelled` when the
/// handle was cancelled first.
pub struct ExecutionHandle<T, E> {
    join: JoinHandle<Result<T, FaultError<E>>>,
    cancelled: Arc<AtomicBool>,
}

impl<T, E> ExecutionHandle<T, E> {
    pub(crate) fn new(join: JoinHandle<Result<T, FaultError<E>>>) -> Self {
        Self {
            join,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Idempotent; safe to call at any point.
    ///
    /// Before the chain starts this prevents the user operation from ever
    /// running; while running it is a best-effort interruption at the next
    /// await point.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.join.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True exactly once the computation reached a terminal outcome
    /// (value, failure, timeout or cancellation).
    pub fn is_done(&self) -> bool {
        self.join.is_finished()
    }
}

impl<T, E> Future for ExecutionHandle<T, E> {
    type Output = Result<T, FaultError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.join).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_err)) => {
                if join_err.is_cancelled() {
                    Poll::Ready(Err(FaultError::Cancelled))
                } else {
                    // The chain task panicked; surface it on the awaiting task.
                    std::panic::resume_unwind(join_err.into_panic())
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn completes_with_the_task_result() {
        let handle: ExecutionHandle<u32, &'static str> =
            ExecutionHandle::new(tokio::spawn(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(7)
            }));

        assert!(!handle.is_done());
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_yields_cancelled() {
        let handle: ExecutionHandle<(), &'static str> =
            ExecutionHandle::new(tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }));

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn done_after_terminal_outcome() {
        let handle: ExecutionHandle<u32, &'static str> =
            ExecutionHandle::new(tokio::spawn(async { Ok(1) }));
        while !handle.is_done() {
            tokio::task::yield_now().await;
        }
        assert_eq!(handle.await.unwrap(), 1);
    }
}
