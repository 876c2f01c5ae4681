//! Resilience policies.
//!
//! # Data Flow
//! ```text
//! One guarded invocation, outermost to innermost:
//!     → fallback.rs (substitute a result if everything below failed)
//!     → retry.rs (re-enter the layers below on retryable failure)
//!     → breaker.rs (fail fast while the operation looks down)
//!     → timeout.rs (deadline over admission + execution)
//!     → bulkhead.rs (bound concurrency, queue async admissions)
//!     → user operation
//! ```
//!
//! # Design Decisions
//! - Layer order is fixed; each layer depends on the semantics of the one
//!   inside it (retries re-acquire bulkhead slots, timeouts count queue
//!   time, breaker outcomes include timeouts)
//! - Policies share no state with each other; the pipeline wires them
//! - All cross-call state (breaker window, bulkhead counts) is per
//!   operation, never global

pub mod breaker;
pub mod bulkhead;
pub mod fallback;
pub mod retry;
pub mod timeout;

pub use breaker::CircuitBreaker;
pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use fallback::{fallback_fn, Fallback, FallbackHandler, FnFallback};
