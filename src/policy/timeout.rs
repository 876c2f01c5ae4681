//! Timeout governor.
//!
//! # Responsibilities
//! - Race a guarded execution against a deadline
//! - Convert deadline expiry into the distinguished `Timeout` fault
//! - Cancel the in-flight execution on expiry (best effort, by drop)
//!
//! # Design Decisions
//! - Uses tokio's timeout facility; the timer is dropped on normal
//!   completion, so no per-call timers leak
//! - Dropping the inner future releases anything it holds (notably a
//!   bulkhead permit) at timeout-detection time
//! - Because the deadline wraps bulkhead admission, queue time counts
//!   against the budget

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::FaultError;
use crate::observability::FaultMetrics;

/// Run `fut` under a deadline, emitting the timeout metric exactly once.
pub(crate) async fn run_with_timeout<T, E, Fut>(
    operation: &str,
    duration: Duration,
    metrics: &Arc<dyn FaultMetrics>,
    fut: Fut,
) -> Result<T, FaultError<E>>
where
    Fut: Future<Output = Result<T, FaultError<E>>>,
{
    let started = Instant::now();
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => {
            metrics.record_timeout_call(operation, false, started.elapsed());
            result
        }
        Err(_) => {
            metrics.record_timeout_call(operation, true, duration);
            tracing::warn!(
                operation = %operation,
                timeout = ?duration,
                "guarded operation timed out"
            );
            Err(FaultError::Timeout { after: duration })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopMetrics;

    #[tokio::test(start_paused = true)]
    async fn deadline_wins_over_slow_operation() {
        let metrics: Arc<dyn FaultMetrics> = Arc::new(NoopMetrics);
        let started = Instant::now();

        let result: Result<(), FaultError<&'static str>> =
            run_with_timeout("op", Duration::from_millis(500), &metrics, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_completion_propagates_unchanged() {
        let metrics: Arc<dyn FaultMetrics> = Arc::new(NoopMetrics);

        let result: Result<u32, FaultError<&'static str>> =
            run_with_timeout("op", Duration::from_millis(500), &metrics, async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_drops_the_inner_future() {
        struct DropFlag(Arc<std::sync::atomic::AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let metrics: Arc<dyn FaultMetrics> = Arc::new(NoopMetrics);
        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());

        let result: Result<(), FaultError<&'static str>> =
            run_with_timeout("op", Duration::from_millis(100), &metrics, async move {
                let _flag = flag;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_timeout());
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }
}
