//! Guarded invocation pipeline.
//!
//! # Responsibilities
//! - Compose the declared policies around a user operation in fixed order
//! - Run the composed chain inline (`call`) or on a worker task (`spawn`)
//! - Consult the enablement source once per invocation and skip disabled
//!   layers entirely
//!
//! # Data Flow
//! ```text
//! call/spawn
//!     → fallback        (outermost; sees the final failure)
//!     → retry           (re-enters everything below per attempt)
//!     → circuit breaker (admission gate + outcome recording)
//!     → timeout         (deadline covers bulkhead queue time)
//!     → bulkhead        (slot held for the duration of the user op)
//!     → user operation
//! ```
//!
//! # Design Decisions
//! - Cross-call state (breaker window, bulkhead counts) lives in an untyped
//!   `GuardCore` shared by every guard for the operation; the result/error
//!   types attach at the `FaultGuard` layer
//! - Enablement is snapshotted at the top of each invocation, so a toggle
//!   flip mid-call cannot produce a half-applied chain
//! - The invocation metric is recorded exactly once per call, after the
//!   fallback has had its say

use std::future::Future;
use std::sync::Arc;

use crate::classify::{classify, Fault};
use crate::clock::{Clock, TokioClock};
use crate::config::{
    AlwaysEnabled, BulkheadConfig, CircuitBreakerConfig, ConfigError, EnablementSource,
    OverrideSet, PolicyConfig, PolicyKind, RetryConfig, TimeoutConfig, validate_config,
};
use crate::error::FaultError;
use crate::handle::ExecutionHandle;
use crate::observability::{FaultMetrics, InvocationResult, RecorderMetrics};
use crate::policy::breaker::CircuitBreaker;
use crate::policy::bulkhead::Bulkhead;
use crate::policy::fallback::Fallback;
use crate::policy::{retry, timeout};

/// Untyped per-operation state shared by every guard handle.
pub(crate) struct GuardCore {
    pub(crate) config: PolicyConfig,
    pub(crate) breaker: Option<Arc<CircuitBreaker>>,
    pub(crate) bulkhead: Option<Bulkhead>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: Arc<dyn FaultMetrics>,
    pub(crate) enablement: Arc<dyn EnablementSource>,
}

impl GuardCore {
    pub(crate) fn new(
        config: PolicyConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn FaultMetrics>,
        enablement: Arc<dyn EnablementSource>,
    ) -> Self {
        let breaker = config.circuit_breaker.as_ref().map(|cfg| {
            Arc::new(CircuitBreaker::new(
                config.operation.clone(),
                cfg.clone(),
                clock.clone(),
                metrics.clone(),
            ))
        });
        let bulkhead = config
            .bulkhead
            .as_ref()
            .map(|cfg| Bulkhead::new(config.operation.clone(), cfg, metrics.clone()));
        Self {
            config,
            breaker,
            bulkhead,
            clock,
            metrics,
            enablement,
        }
    }
}

/// Builder for a guarded operation.
///
/// Unset policies are absent from the chain, not defaulted in. The built
/// configuration is validated; an invalid one never produces a guard.
pub struct GuardBuilder {
    config: PolicyConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn FaultMetrics>,
    enablement: Arc<dyn EnablementSource>,
    overrides: Option<OverrideSet>,
}

impl GuardBuilder {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            config: PolicyConfig::new(operation),
            clock: Arc::new(TokioClock),
            metrics: Arc::new(RecorderMetrics),
            enablement: Arc::new(AlwaysEnabled),
            overrides: None,
        }
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.config.retry = Some(config);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = Some(config);
        self
    }

    pub fn bulkhead(mut self, config: BulkheadConfig) -> Self {
        self.config.bulkhead = Some(config);
        self
    }

    pub fn timeout(mut self, config: TimeoutConfig) -> Self {
        self.config.timeout = Some(config);
        self
    }

    /// Declare the operation asynchronous: `spawn` is the intended entry
    /// point and bulkhead admissions queue instead of rejecting.
    pub fn asynchronous(mut self) -> Self {
        self.config.asynchronous = true;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn FaultMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn enablement(mut self, source: Arc<dyn EnablementSource>) -> Self {
        self.enablement = source;
        self
    }

    /// Apply runtime overrides on top of the declared parameters at build
    /// time.
    pub fn overrides(mut self, set: OverrideSet) -> Self {
        self.overrides = Some(set);
        self
    }

    pub fn build<T, E: Fault>(self) -> Result<FaultGuard<T, E>, ConfigError> {
        let mut config = self.config;
        if let Some(set) = &self.overrides {
            set.resolve(&mut config);
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        tracing::debug!(
            operation = %config.operation,
            retry = config.retry.is_some(),
            circuit_breaker = config.circuit_breaker.is_some(),
            bulkhead = config.bulkhead.is_some(),
            timeout = config.timeout.is_some(),
            asynchronous = config.asynchronous,
            "guard built"
        );
        Ok(FaultGuard {
            core: Arc::new(GuardCore::new(
                config,
                self.clock,
                self.metrics,
                self.enablement,
            )),
            fallback: None,
        })
    }
}

/// A guarded operation: the composed policy chain plus an optional typed
/// fallback.
///
/// Cloning is cheap and every clone shares the same breaker and bulkhead
/// state.
pub struct FaultGuard<T, E> {
    core: Arc<GuardCore>,
    fallback: Option<Fallback<T, E>>,
}

impl<T, E> Clone for FaultGuard<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

impl<T, E: Fault> FaultGuard<T, E> {
    pub fn builder(operation: impl Into<String>) -> GuardBuilder {
        GuardBuilder::new(operation)
    }

    pub(crate) fn from_core(core: Arc<GuardCore>) -> Self {
        Self {
            core,
            fallback: None,
        }
    }

    pub fn operation(&self) -> &str {
        &self.core.config.operation
    }

    /// Breaker state label, when a breaker is declared.
    pub fn breaker_state(&self) -> Option<&'static str> {
        self.core.breaker.as_ref().map(|cb| cb.state_name())
    }

    pub fn with_fallback(mut self, fallback: Fallback<T, E>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Run the composed chain inline and await the terminal outcome.
    pub async fn call<Op, Fut>(&self, op: Op) -> Result<T, FaultError<E>>
    where
        Op: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Self::run(self.core.clone(), self.fallback.clone(), op).await
    }

    /// Run the composed chain on a worker task and return immediately.
    ///
    /// The handle resolves to the same outcome `call` would produce;
    /// cancelling it unwinds whatever layer the chain is in.
    pub fn spawn<Op, Fut>(&self, op: Op) -> ExecutionHandle<T, E>
    where
        Op: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let join = tokio::spawn(Self::run(self.core.clone(), self.fallback.clone(), op));
        ExecutionHandle::new(join)
    }

    async fn run<Op, Fut>(
        core: Arc<GuardCore>,
        fallback: Option<Fallback<T, E>>,
        op: Op,
    ) -> Result<T, FaultError<E>>
    where
        Op: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let operation = core.config.operation.as_str();
        let en = &core.enablement;

        // One enablement snapshot per invocation.
        let asynchronous =
            core.config.asynchronous && en.is_enabled(operation, PolicyKind::Asynchronous);
        let retry_cfg = core
            .config
            .retry
            .as_ref()
            .filter(|_| en.is_enabled(operation, PolicyKind::Retry));
        let breaker = core
            .breaker
            .as_ref()
            .filter(|_| en.is_enabled(operation, PolicyKind::CircuitBreaker));
        let bulkhead = core
            .bulkhead
            .as_ref()
            .filter(|_| en.is_enabled(operation, PolicyKind::Bulkhead));
        let timeout_cfg = core
            .config
            .timeout
            .as_ref()
            .filter(|_| en.is_enabled(operation, PolicyKind::Timeout));

        let result = match retry_cfg {
            Some(cfg) => {
                retry::run_with_retry(operation, cfg, &core.clock, &core.metrics, || {
                    attempt(&core, breaker, bulkhead, timeout_cfg, &op, asynchronous)
                })
                .await
            }
            None => attempt(&core, breaker, bulkhead, timeout_cfg, &op, asynchronous).await,
        };

        match result {
            Ok(value) => {
                core.metrics
                    .record_invocation(operation, InvocationResult::ValueReturned, false);
                Ok(value)
            }
            Err(err) => {
                let fb = fallback
                    .as_ref()
                    .filter(|_| en.is_enabled(operation, PolicyKind::Fallback))
                    .filter(|fb| fb.applies_to(&err));
                match fb {
                    Some(fb) => match fb.resolve(err).await {
                        Ok(value) => {
                            core.metrics.record_invocation(
                                operation,
                                InvocationResult::ValueReturned,
                                true,
                            );
                            Ok(value)
                        }
                        Err(err) => {
                            core.metrics.record_invocation(
                                operation,
                                InvocationResult::ExceptionThrown,
                                true,
                            );
                            Err(err)
                        }
                    },
                    None => {
                        core.metrics.record_invocation(
                            operation,
                            InvocationResult::ExceptionThrown,
                            false,
                        );
                        Err(err)
                    }
                }
            }
        }
    }
}

/// One pass through breaker, timeout and bulkhead down to the user
/// operation. Retry calls this once per attempt.
async fn attempt<T, E, Op, Fut>(
    core: &GuardCore,
    breaker: Option<&Arc<CircuitBreaker>>,
    bulkhead: Option<&Bulkhead>,
    timeout_cfg: Option<&TimeoutConfig>,
    op: &Op,
    asynchronous: bool,
) -> Result<T, FaultError<E>>
where
    E: Fault,
    Op: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(cb) = breaker {
        if cb.try_acquire().is_err() {
            return Err(FaultError::CircuitOpen {
                operation: core.config.operation.clone(),
            });
        }
    }

    let inner = admit_and_run(core, bulkhead, op, asynchronous);
    let result = match timeout_cfg {
        Some(t) => {
            timeout::run_with_timeout(&core.config.operation, t.duration, &core.metrics, inner)
                .await
        }
        None => inner.await,
    };

    if let Some(cb) = breaker {
        // Skip-classified failures count as successes in the window.
        let failure = match &result {
            Ok(_) => false,
            Err(err) => classify(err.fault_type(), &cb.config().fail_on, &cb.config().skip_on),
        };
        cb.on_outcome(failure);
    }

    result
}

/// Bulkhead admission plus the user operation; the permit is held until the
/// operation resolves or this future is dropped.
async fn admit_and_run<T, E, Op, Fut>(
    core: &GuardCore,
    bulkhead: Option<&Bulkhead>,
    op: &Op,
    asynchronous: bool,
) -> Result<T, FaultError<E>>
where
    Op: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let _permit = match bulkhead {
        Some(bh) => {
            let permit = if asynchronous {
                bh.acquire().await
            } else {
                bh.try_acquire()
            };
            match permit {
                Some(p) => Some(p),
                None => {
                    return Err(FaultError::BulkheadFull {
                        operation: core.config.operation.clone(),
                        capacity: bh.capacity(),
                    })
                }
            }
        }
        None => None,
    };
    op().await.map_err(FaultError::Execution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Toggles;
    use crate::config::ToggleEnablement;
    use crate::observability::NoopMetrics;
    use crate::policy::fallback::fallback_fn;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn quiet() -> GuardBuilder {
        GuardBuilder::new("test").metrics(Arc::new(NoopMetrics))
    }

    #[tokio::test]
    async fn bare_guard_passes_results_through() {
        let guard: FaultGuard<u32, &'static str> = quiet().build().unwrap();
        assert_eq!(guard.call(|| async { Ok(41) }).await.unwrap(), 41);
        let err = guard
            .call(|| async { Err("boom") })
            .await
            .unwrap_err();
        assert_eq!(err.into_execution().unwrap(), "boom");
    }

    #[tokio::test]
    async fn retry_then_fallback_on_exhaustion() {
        let guard: FaultGuard<&'static str, &'static str> = quiet()
            .retry(RetryConfig {
                max_retries: 2,
                delay: Duration::ZERO,
                jitter: Duration::ZERO,
                ..Default::default()
            })
            .build()
            .unwrap()
            .with_fallback(Fallback::new(fallback_fn(
                |_err: &FaultError<&'static str>| async { Ok("fallback") },
            )));

        let calls = AtomicU32::new(0);
        let result = guard
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;

        assert_eq!(result.unwrap(), "fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn open_breaker_rejects_without_invoking() {
        let clock = Arc::new(ManualClock::new());
        let guard: FaultGuard<(), &'static str> = quiet()
            .clock(clock)
            .circuit_breaker(CircuitBreakerConfig {
                request_volume_threshold: 2,
                failure_ratio: 0.5,
                ..Default::default()
            })
            .build()
            .unwrap();

        for _ in 0..2 {
            let _ = guard.call(|| async { Err("down") }).await;
        }
        assert_eq!(guard.breaker_state(), Some("open"));

        let calls = AtomicU32::new(0);
        let err = guard
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_breaker_failure() {
        let guard: FaultGuard<(), &'static str> = quiet()
            .circuit_breaker(CircuitBreakerConfig {
                request_volume_threshold: 2,
                failure_ratio: 0.5,
                ..Default::default()
            })
            .timeout(TimeoutConfig {
                duration: Duration::from_millis(50),
            })
            .build()
            .unwrap();

        for _ in 0..2 {
            let err = guard
                .call(|| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                })
                .await
                .unwrap_err();
            assert!(err.is_timeout());
        }
        assert_eq!(guard.breaker_state(), Some("open"));
    }

    #[tokio::test]
    async fn disabled_bulkhead_is_skipped_entirely() {
        let mut toggles = Toggles::new();
        toggles.set_operation("test", PolicyKind::Bulkhead, false);

        let guard: FaultGuard<(), &'static str> = quiet()
            .bulkhead(BulkheadConfig {
                capacity: 1,
                queue_capacity: 0,
            })
            .enablement(Arc::new(ToggleEnablement::new(toggles)))
            .build()
            .unwrap();

        // With the bulkhead disabled, concurrent calls beyond capacity are
        // all admitted.
        let release = Arc::new(tokio::sync::Notify::new());
        let r2 = release.clone();
        let g2 = guard.clone();
        let first = tokio::spawn(async move {
            g2.call(move || {
                let release = r2.clone();
                async move {
                    release.notified().await;
                    Ok(())
                }
            })
            .await
        });
        tokio::task::yield_now().await;

        let second = guard.call(|| async { Ok(()) }).await;
        assert!(second.is_ok());
        release.notify_one();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn invalid_config_never_builds() {
        let result = quiet()
            .retry(RetryConfig {
                max_retries: -2,
                ..Default::default()
            })
            .build::<(), &'static str>();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn spawned_chain_resolves_through_the_handle() {
        let guard: FaultGuard<u32, &'static str> = quiet().build().unwrap();
        let handle = guard.spawn(|| async { Ok(7) });
        assert_eq!(handle.await.unwrap(), 7);
    }
}
