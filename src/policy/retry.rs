//! Retry governor.
//!
//! # Responsibilities
//! - Re-invoke a guarded attempt while the failure classifies as retryable
//! - Enforce the attempt bound (`max_retries`, `-1` = unlimited) and the
//!   elapsed-duration budget (`max_duration`)
//! - Sleep `delay ± jitter` between attempts without blocking other work
//!
//! # Design Decisions
//! - The attempt closure re-enters the inner layers fresh each time, so no
//!   bulkhead slot or breaker admission is held across the inter-retry delay
//! - Jitter is uniform in `[-jitter, +jitter]`, floored at zero
//! - The final failure propagates unchanged; exhaustion is visible in the
//!   retry metrics, not as a distinct error type

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::classify::{classify, Fault};
use crate::clock::Clock;
use crate::config::RetryConfig;
use crate::error::FaultError;
use crate::observability::{FaultMetrics, RetryCallResult};

/// Uniform `delay ± jitter`, floored at zero.
pub(crate) fn jittered_delay(delay: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return delay;
    }
    let base = delay.as_millis() as i128;
    let spread = jitter.as_millis() as i128;
    let offset = rand::thread_rng().gen_range(-spread..=spread);
    Duration::from_millis((base + offset).max(0) as u64)
}

/// Drive `attempt` to a terminal outcome under the retry policy.
pub(crate) async fn run_with_retry<T, E, F, Fut>(
    operation: &str,
    config: &RetryConfig,
    clock: &Arc<dyn Clock>,
    metrics: &Arc<dyn FaultMetrics>,
    mut attempt: F,
) -> Result<T, FaultError<E>>
where
    E: Fault,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FaultError<E>>>,
{
    let start = clock.now();
    let mut retries: u32 = 0;

    loop {
        match attempt().await {
            Ok(value) => {
                metrics.record_retry_call(operation, retries > 0, RetryCallResult::ValueReturned);
                metrics.record_retries(operation, retries as u64);
                return Ok(value);
            }
            Err(err) => {
                let verdict = if !classify(err.fault_type(), &config.retry_on, &config.abort_on) {
                    Some(RetryCallResult::ExceptionNotRetryable)
                } else if config.max_retries >= 0 && retries >= config.max_retries as u32 {
                    Some(RetryCallResult::MaxRetriesReached)
                } else if clock.now().duration_since(start) >= config.max_duration {
                    Some(RetryCallResult::MaxDurationReached)
                } else {
                    None
                };

                if let Some(result) = verdict {
                    metrics.record_retry_call(operation, retries > 0, result);
                    metrics.record_retries(operation, retries as u64);
                    return Err(err);
                }

                let delay = jittered_delay(config.delay, config.jitter);
                retries += 1;
                tracing::debug!(
                    operation = %operation,
                    retry = retries,
                    delay = ?delay,
                    fault = err.fault_type().name(),
                    "retrying guarded operation"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
