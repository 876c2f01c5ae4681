//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All policies produce:
//!     → logging.rs (structured transition events via tracing)
//!     → metrics.rs (counters, gauges, histograms via FaultMetrics)
//!
//! Consumers:
//!     → Log aggregation (stdout, file, remote)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The engine emits events; aggregation and exposition live behind the
//!   `FaultMetrics` seam so the reporting subsystem stays replaceable
//! - Metric updates are cheap and never hold policy locks

pub mod logging;
pub mod metrics;

pub use metrics::{
    init_metrics, BreakerCallResult, FaultMetrics, InvocationResult, NoopMetrics, RecorderMetrics,
    RetryCallResult,
};
