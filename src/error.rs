//! Fault taxonomy for guarded invocations.
//!
//! # Responsibilities
//! - Distinguish the engine's own outcomes (timeout, circuit open, bulkhead
//!   full, cancelled) from whatever the wrapped operation returned
//! - Bridge every outcome into the failure classifier via `fault_type()`
//!
//! # Design Decisions
//! - Retry exhaustion surfaces as the last underlying error, not a distinct
//!   variant; callers that care inspect the retry metrics instead
//! - The user error type `E` stays fully generic; it only needs `Fault` when
//!   a policy has to classify it

use std::time::Duration;
use thiserror::Error;

use crate::classify::{self, ErrorType, Fault};

/// Terminal outcome of a guarded invocation that did not produce a value.
#[derive(Debug, Error)]
pub enum FaultError<E> {
    /// The wrapped operation itself returned an error.
    #[error("guarded operation failed")]
    Execution(E),

    /// The timeout governor cut the execution short.
    #[error("operation timed out after {after:?}")]
    Timeout { after: Duration },

    /// The circuit breaker rejected the call without executing it.
    #[error("circuit breaker open for operation '{operation}'")]
    CircuitOpen { operation: String },

    /// The bulkhead was at capacity (and, for async calls, the queue was full).
    #[error("bulkhead full for operation '{operation}' (capacity {capacity})")]
    BulkheadFull { operation: String, capacity: usize },

    /// The invocation was cancelled before reaching a result.
    #[error("execution cancelled")]
    Cancelled,
}

impl<E> FaultError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FaultError::Timeout { .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, FaultError::CircuitOpen { .. })
    }

    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, FaultError::BulkheadFull { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FaultError::Cancelled)
    }

    /// The underlying operation error, if that is what this outcome carries.
    pub fn into_execution(self) -> Option<E> {
        match self {
            FaultError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: Fault> FaultError<E> {
    /// Position of this outcome in the fault-type hierarchy, for
    /// `retry_on`/`abort_on`, `fail_on`/`skip_on` and `apply_on`/`skip_on`
    /// classification.
    pub fn fault_type(&self) -> &'static ErrorType {
        match self {
            FaultError::Execution(e) => e.fault_type(),
            FaultError::Timeout { .. } => &classify::TIMEOUT,
            FaultError::CircuitOpen { .. } => &classify::CIRCUIT_OPEN,
            FaultError::BulkheadFull { .. } => &classify::BULKHEAD_FULL,
            FaultError::Cancelled => &classify::CANCELLED,
        }
    }
}
