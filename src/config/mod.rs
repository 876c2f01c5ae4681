//! Policy configuration subsystem.
//!
//! # Data Flow
//! ```text
//! declared PolicyConfig (code)
//!     → loader.rs (optional TOML overrides: parse & deserialize)
//!     → OverrideSet::resolve (operation entry > global > declared)
//!     → validation.rs (semantic checks, all errors collected)
//!     → PolicyConfig (validated, immutable)
//!     → shared read-only by every invocation of that operation
//!
//! Per call:
//!     enablement.rs decides which configured policies join the chain
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; changes require re-registration
//! - All parameters have defaults so a minimal declaration works
//! - Enablement is separate from configuration: a disabled policy is
//!   omitted from the chain, not configured to a no-op

pub mod enablement;
pub mod loader;
pub mod schema;
pub mod validation;

pub use enablement::{AlwaysEnabled, EnablementSource, PolicyKind, ToggleEnablement, Toggles};
pub use loader::{load_overrides, overrides_from_str, ConfigError};
pub use schema::{
    BulkheadConfig, CircuitBreakerConfig, OverrideSet, PolicyConfig, RetryConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
