//! Policy configuration schema.
//!
//! Two families of types live here: the resolved, immutable per-operation
//! `PolicyConfig` consumed by the pipeline, and the serde-facing override
//! structs deserialized from config files. Overrides carry only the tunable
//! scalars; fault-type lists are code-level and set on the resolved structs.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::{ErrorType, ANY_FAULT};

/// Resolved parameter set for one guarded operation.
///
/// Built once at registration time, never mutated, shared read-only by all
/// concurrent invocations of that operation. A `None` policy is absent from
/// the composed chain entirely.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Operation identifier for logging, metrics and registry lookup.
    pub operation: String,

    pub retry: Option<RetryConfig>,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub bulkhead: Option<BulkheadConfig>,
    pub timeout: Option<TimeoutConfig>,

    /// Run the whole chain on a worker task, returning a handle immediately.
    pub asynchronous: bool,
}

impl PolicyConfig {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            retry: None,
            circuit_breaker: None,
            bulkhead: None,
            timeout: None,
            asynchronous: false,
        }
    }
}

/// Retry governor parameters.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt; `-1` = unlimited.
    pub max_retries: i32,

    /// Base delay between attempts.
    pub delay: Duration,

    /// Uniform jitter applied as `delay ± jitter`, floored at zero.
    pub jitter: Duration,

    /// Total budget for all attempts measured from the first invocation.
    pub max_duration: Duration,

    /// Fault types that are retried.
    pub retry_on: Vec<&'static ErrorType>,

    /// Fault types that abort retrying; wins over `retry_on`.
    pub abort_on: Vec<&'static ErrorType>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::ZERO,
            jitter: Duration::from_millis(200),
            max_duration: Duration::from_secs(180),
            retry_on: vec![&ANY_FAULT],
            abort_on: Vec::new(),
        }
    }
}

/// Circuit breaker parameters.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Size of the rolling outcome window.
    pub request_volume_threshold: usize,

    /// Failure ratio within a full window that opens the circuit (0.0..=1.0).
    pub failure_ratio: f64,

    /// How long the circuit stays open before a trial call half-opens it.
    pub delay: Duration,

    /// Consecutive half-open successes required to close again.
    pub success_threshold: u32,

    /// Fault types counted as failures in the window.
    pub fail_on: Vec<&'static ErrorType>,

    /// Fault types never counted as failures; wins over `fail_on`.
    pub skip_on: Vec<&'static ErrorType>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            request_volume_threshold: 20,
            failure_ratio: 0.5,
            delay: Duration::from_secs(5),
            success_threshold: 1,
            fail_on: vec![&ANY_FAULT],
            skip_on: Vec::new(),
        }
    }
}

/// Bulkhead parameters.
#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    /// Maximum concurrent executions.
    pub capacity: usize,

    /// Maximum queued admissions for asynchronous invocations. Synchronous
    /// invocations never queue.
    pub queue_capacity: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            queue_capacity: 10,
        }
    }
}

/// Timeout governor parameters.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum execution duration, including bulkhead queue time.
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Override schema (config-file facing)
// ---------------------------------------------------------------------------

/// Runtime overrides for declared policy parameters.
///
/// `global` applies to every operation; entries in `operations` win over
/// `global`; absent fields fall back to the declared defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OverrideSet {
    pub global: PolicyOverrides,
    pub operations: HashMap<String, PolicyOverrides>,
}

impl OverrideSet {
    /// Merge these overrides into a resolved config: global first, then the
    /// operation-specific entry so it wins on overlap.
    pub fn resolve(&self, config: &mut PolicyConfig) {
        self.global.apply(config);
        if let Some(op) = self.operations.get(&config.operation) {
            op.apply(config);
        }
    }
}

/// Per-policy override sections; every field optional.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyOverrides {
    pub retry: Option<RetryOverrides>,
    pub circuit_breaker: Option<CircuitBreakerOverrides>,
    pub bulkhead: Option<BulkheadOverrides>,
    pub timeout: Option<TimeoutOverrides>,
}

impl PolicyOverrides {
    fn apply(&self, config: &mut PolicyConfig) {
        if let (Some(over), Some(cfg)) = (&self.retry, config.retry.as_mut()) {
            over.apply(cfg);
        }
        if let (Some(over), Some(cfg)) = (&self.circuit_breaker, config.circuit_breaker.as_mut()) {
            over.apply(cfg);
        }
        if let (Some(over), Some(cfg)) = (&self.bulkhead, config.bulkhead.as_mut()) {
            over.apply(cfg);
        }
        if let (Some(over), Some(cfg)) = (&self.timeout, config.timeout.as_mut()) {
            over.apply(cfg);
        }
    }
}

/// Retry parameter overrides.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RetryOverrides {
    /// Enable/disable the retry policy for the matching scope.
    pub enabled: Option<bool>,
    pub max_retries: Option<i32>,
    pub delay_ms: Option<u64>,
    pub jitter_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
}

impl RetryOverrides {
    fn apply(&self, cfg: &mut RetryConfig) {
        if let Some(v) = self.max_retries {
            cfg.max_retries = v;
        }
        if let Some(v) = self.delay_ms {
            cfg.delay = Duration::from_millis(v);
        }
        if let Some(v) = self.jitter_ms {
            cfg.jitter = Duration::from_millis(v);
        }
        if let Some(v) = self.max_duration_ms {
            cfg.max_duration = Duration::from_millis(v);
        }
    }
}

/// Circuit breaker parameter overrides.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CircuitBreakerOverrides {
    pub enabled: Option<bool>,
    pub request_volume_threshold: Option<usize>,
    pub failure_ratio: Option<f64>,
    pub delay_ms: Option<u64>,
    pub success_threshold: Option<u32>,
}

impl CircuitBreakerOverrides {
    fn apply(&self, cfg: &mut CircuitBreakerConfig) {
        if let Some(v) = self.request_volume_threshold {
            cfg.request_volume_threshold = v;
        }
        if let Some(v) = self.failure_ratio {
            cfg.failure_ratio = v;
        }
        if let Some(v) = self.delay_ms {
            cfg.delay = Duration::from_millis(v);
        }
        if let Some(v) = self.success_threshold {
            cfg.success_threshold = v;
        }
    }
}

/// Bulkhead parameter overrides.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BulkheadOverrides {
    pub enabled: Option<bool>,
    pub capacity: Option<usize>,
    pub queue_capacity: Option<usize>,
}

impl BulkheadOverrides {
    fn apply(&self, cfg: &mut BulkheadConfig) {
        if let Some(v) = self.capacity {
            cfg.capacity = v;
        }
        if let Some(v) = self.queue_capacity {
            cfg.queue_capacity = v;
        }
    }
}

/// Timeout parameter overrides.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TimeoutOverrides {
    pub enabled: Option<bool>,
    pub duration_ms: Option<u64>,
}

impl TimeoutOverrides {
    fn apply(&self, cfg: &mut TimeoutConfig) {
        if let Some(v) = self.duration_ms {
            cfg.duration = Duration::from_millis(v);
        }
    }
}
