//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at process start
//! - Respect `RUST_LOG` when set, fall back to the given default level
//!
//! # Design Decisions
//! - Policies log state transitions with structured fields (operation,
//!   attempt, state) rather than formatted strings

use tracing_subscriber::EnvFilter;

/// Initialize logging. Call once; later calls are ignored.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
