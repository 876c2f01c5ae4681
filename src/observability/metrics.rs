//! Metrics sink for policy events.
//!
//! # Responsibilities
//! - Define the structured events every policy emits exactly once per
//!   relevant occurrence
//! - Forward them to the `metrics` recorder with an `operation` label
//!
//! # Metrics
//! - `faultguard_invocations_total` (counter): result, fallback applied
//! - `faultguard_retry_calls_total` (counter): retried, result
//! - `faultguard_retries_total` (counter): retries performed per invocation
//! - `faultguard_timeout_calls_total` (counter): timed_out
//! - `faultguard_execution_duration_seconds` (histogram): guarded execution time
//! - `faultguard_breaker_calls_total` (counter): success, failure, circuit_open
//! - `faultguard_breaker_opened_total` (counter)
//! - `faultguard_breaker_state_millis` (counter): cumulative time per state
//! - `faultguard_bulkhead_calls_total` (counter): accepted, rejected
//! - `faultguard_bulkhead_running` (gauge): concurrent executions
//! - `faultguard_bulkhead_queue_depth` (gauge): queued admissions
//! - `faultguard_bulkhead_wait_seconds` (histogram): queue wait time
//!
//! # Design Decisions
//! - The engine talks to a `FaultMetrics` trait object; aggregation is the
//!   sink's problem, emission happens exactly once per event
//! - Low-overhead updates (label maps are small, no locks held while emitting)

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Outcome of a completed invocation as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationResult {
    ValueReturned,
    ExceptionThrown,
}

impl InvocationResult {
    fn as_label(self) -> &'static str {
        match self {
            InvocationResult::ValueReturned => "value_returned",
            InvocationResult::ExceptionThrown => "exception_thrown",
        }
    }
}

/// Outcome of one call through the retry governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCallResult {
    ValueReturned,
    ExceptionNotRetryable,
    MaxRetriesReached,
    MaxDurationReached,
}

impl RetryCallResult {
    fn as_label(self) -> &'static str {
        match self {
            RetryCallResult::ValueReturned => "value_returned",
            RetryCallResult::ExceptionNotRetryable => "exception_not_retryable",
            RetryCallResult::MaxRetriesReached => "max_retries_reached",
            RetryCallResult::MaxDurationReached => "max_duration_reached",
        }
    }
}

/// Outcome of one call through the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerCallResult {
    Success,
    Failure,
    CircuitOpen,
}

impl BreakerCallResult {
    fn as_label(self) -> &'static str {
        match self {
            BreakerCallResult::Success => "success",
            BreakerCallResult::Failure => "failure",
            BreakerCallResult::CircuitOpen => "circuit_open",
        }
    }
}

/// Receives every policy event; implementations aggregate however they like.
pub trait FaultMetrics: Send + Sync {
    fn record_invocation(&self, operation: &str, result: InvocationResult, fallback_applied: bool);
    fn record_retry_call(&self, operation: &str, retried: bool, result: RetryCallResult);
    fn record_retries(&self, operation: &str, count: u64);
    fn record_timeout_call(&self, operation: &str, timed_out: bool, duration: Duration);
    fn record_breaker_call(&self, operation: &str, result: BreakerCallResult);
    fn record_breaker_opened(&self, operation: &str);
    fn record_breaker_state(&self, operation: &str, state: &'static str, spent: Duration);
    fn record_bulkhead_call(&self, operation: &str, accepted: bool);
    fn record_bulkhead_running(&self, operation: &str, running: usize);
    fn record_bulkhead_queue(&self, operation: &str, depth: usize);
    fn record_bulkhead_wait(&self, operation: &str, wait: Duration);
}

/// Default sink; forwards to the installed `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecorderMetrics;

impl FaultMetrics for RecorderMetrics {
    fn record_invocation(&self, operation: &str, result: InvocationResult, fallback_applied: bool) {
        counter!(
            "faultguard_invocations_total",
            "operation" => operation.to_string(),
            "result" => result.as_label(),
            "fallback" => if fallback_applied { "applied" } else { "not_applied" },
        )
        .increment(1);
    }

    fn record_retry_call(&self, operation: &str, retried: bool, result: RetryCallResult) {
        counter!(
            "faultguard_retry_calls_total",
            "operation" => operation.to_string(),
            "retried" => if retried { "true" } else { "false" },
            "result" => result.as_label(),
        )
        .increment(1);
    }

    fn record_retries(&self, operation: &str, count: u64) {
        counter!(
            "faultguard_retries_total",
            "operation" => operation.to_string(),
        )
        .increment(count);
    }

    fn record_timeout_call(&self, operation: &str, timed_out: bool, duration: Duration) {
        counter!(
            "faultguard_timeout_calls_total",
            "operation" => operation.to_string(),
            "timed_out" => if timed_out { "true" } else { "false" },
        )
        .increment(1);
        histogram!(
            "faultguard_execution_duration_seconds",
            "operation" => operation.to_string(),
        )
        .record(duration.as_secs_f64());
    }

    fn record_breaker_call(&self, operation: &str, result: BreakerCallResult) {
        counter!(
            "faultguard_breaker_calls_total",
            "operation" => operation.to_string(),
            "result" => result.as_label(),
        )
        .increment(1);
    }

    fn record_breaker_opened(&self, operation: &str) {
        counter!(
            "faultguard_breaker_opened_total",
            "operation" => operation.to_string(),
        )
        .increment(1);
    }

    fn record_breaker_state(&self, operation: &str, state: &'static str, spent: Duration) {
        counter!(
            "faultguard_breaker_state_millis",
            "operation" => operation.to_string(),
            "state" => state,
        )
        .increment(spent.as_millis() as u64);
    }

    fn record_bulkhead_call(&self, operation: &str, accepted: bool) {
        counter!(
            "faultguard_bulkhead_calls_total",
            "operation" => operation.to_string(),
            "result" => if accepted { "accepted" } else { "rejected" },
        )
        .increment(1);
    }

    fn record_bulkhead_running(&self, operation: &str, running: usize) {
        gauge!(
            "faultguard_bulkhead_running",
            "operation" => operation.to_string(),
        )
        .set(running as f64);
    }

    fn record_bulkhead_queue(&self, operation: &str, depth: usize) {
        gauge!(
            "faultguard_bulkhead_queue_depth",
            "operation" => operation.to_string(),
        )
        .set(depth as f64);
    }

    fn record_bulkhead_wait(&self, operation: &str, wait: Duration) {
        histogram!(
            "faultguard_bulkhead_wait_seconds",
            "operation" => operation.to_string(),
        )
        .record(wait.as_secs_f64());
    }
}

/// Sink that drops everything; useful in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl FaultMetrics for NoopMetrics {
    fn record_invocation(&self, _: &str, _: InvocationResult, _: bool) {}
    fn record_retry_call(&self, _: &str, _: bool, _: RetryCallResult) {}
    fn record_retries(&self, _: &str, _: u64) {}
    fn record_timeout_call(&self, _: &str, _: bool, _: Duration) {}
    fn record_breaker_call(&self, _: &str, _: BreakerCallResult) {}
    fn record_breaker_opened(&self, _: &str) {}
    fn record_breaker_state(&self, _: &str, _: &'static str, _: Duration) {}
    fn record_bulkhead_call(&self, _: &str, _: bool) {}
    fn record_bulkhead_running(&self, _: &str, _: usize) {}
    fn record_bulkhead_queue(&self, _: &str, _: usize) {}
    fn record_bulkhead_wait(&self, _: &str, _: Duration) {}
}

/// Install the Prometheus exporter and expose metrics on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}
