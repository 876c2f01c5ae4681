//! Composable Fault-Tolerance Execution Library

pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod handle;
pub mod observability;
pub mod pipeline;
pub mod policy;
pub mod registry;

pub use classify::{ErrorType, Fault, ANY_FAULT};
pub use config::PolicyConfig;
pub use error::FaultError;
pub use handle::ExecutionHandle;
pub use pipeline::{FaultGuard, GuardBuilder};
pub use policy::{fallback_fn, Fallback};
pub use registry::GuardRegistry;
