//! Circuit breaker for guarded operations.
//!
//! # States
//! - Closed: normal operation, outcomes recorded in a rolling window
//! - Open: calls fail fast, the operation is never invoked
//! - Half-Open: trial calls pass through to probe recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: window full and failure ratio >= threshold
//! Open → Half-Open: first call after the open delay elapses
//! Half-Open → Closed: success_threshold consecutive successes
//! Half-Open → Open: any classified failure
//! ```
//!
//! # Design Decisions
//! - One breaker per operation (not global); one mutex per breaker so
//!   check-and-transition is atomic with respect to concurrent callers
//! - Rejections are never recorded in the window; only outcomes of calls
//!   that actually executed count
//! - The window is cleared on every state transition, so re-opening after a
//!   close requires a fresh full window

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;
use crate::observability::{BreakerCallResult, FaultMetrics};

/// Fixed-capacity rolling record of classified outcomes.
struct Window {
    outcomes: VecDeque<bool>, // true = failure
    capacity: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, failure: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(failure);
    }

    fn is_full(&self) -> bool {
        self.outcomes.len() == self.capacity
    }

    fn failure_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|&&f| f).count();
        failures as f64 / self.outcomes.len() as f64
    }

    fn clear(&mut self) {
        self.outcomes.clear();
    }
}

enum State {
    Closed,
    Open { since: Instant },
    HalfOpen { successes: u32 },
}

impl State {
    fn label(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open { .. } => "open",
            State::HalfOpen { .. } => "half_open",
        }
    }
}

struct Inner {
    state: State,
    entered: Instant,
    window: Window,
}

/// Per-operation breaker state machine.
pub struct CircuitBreaker {
    operation: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn FaultMetrics>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(
        operation: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn FaultMetrics>,
    ) -> Self {
        let now = clock.now();
        let window = Window::new(config.request_volume_threshold);
        Self {
            operation: operation.into(),
            config,
            clock,
            metrics,
            inner: Mutex::new(Inner {
                state: State::Closed,
                entered: now,
                window,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state label ("closed", "open", "half_open").
    pub fn state_name(&self) -> &'static str {
        self.inner.lock().expect("breaker mutex poisoned").state.label()
    }

    /// Gate a call. `Err(())` means the circuit is open and the operation
    /// must not be invoked. The first call after the open delay flips the
    /// state to half-open and is let through.
    pub fn try_acquire(&self) -> Result<(), ()> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            State::Closed | State::HalfOpen { .. } => Ok(()),
            State::Open { since } => {
                if now.duration_since(since) >= self.config.delay {
                    self.transition(&mut inner, State::HalfOpen { successes: 0 }, now);
                    tracing::info!(operation = %self.operation, "circuit breaker half-open");
                    Ok(())
                } else {
                    self.metrics
                        .record_breaker_call(&self.operation, BreakerCallResult::CircuitOpen);
                    Err(())
                }
            }
        }
    }

    /// Record the classified outcome of an executed call.
    pub fn on_outcome(&self, failure: bool) {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        self.metrics.record_breaker_call(
            &self.operation,
            if failure {
                BreakerCallResult::Failure
            } else {
                BreakerCallResult::Success
            },
        );

        match inner.state {
            State::Closed => {
                inner.window.record(failure);
                if inner.window.is_full()
                    && inner.window.failure_ratio() >= self.config.failure_ratio
                {
                    self.open(&mut inner, now);
                }
            }
            State::HalfOpen { successes } => {
                if failure {
                    self.open(&mut inner, now);
                } else {
                    let successes = successes + 1;
                    if successes >= self.config.success_threshold {
                        self.transition(&mut inner, State::Closed, now);
                        tracing::info!(operation = %self.operation, "circuit breaker closed");
                    } else {
                        inner.state = State::HalfOpen { successes };
                    }
                }
            }
            // A straggler from before the circuit opened; its outcome no
            // longer belongs to any window.
            State::Open { .. } => {}
        }
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        self.transition(inner, State::Open { since: now }, now);
        self.metrics.record_breaker_opened(&self.operation);
        tracing::warn!(operation = %self.operation, "circuit breaker opened");
    }

    fn transition(&self, inner: &mut Inner, next: State, now: Instant) {
        self.metrics.record_breaker_state(
            &self.operation,
            inner.state.label(),
            now.duration_since(inner.entered),
        );
        inner.state = next;
        inner.entered = now;
        inner.window.clear();
    }
}
