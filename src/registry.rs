//! Guard registry.
//!
//! # Responsibilities
//! - Own the resolved configuration and cross-call state for every
//!   registered operation
//! - Hand out typed guards that all share one breaker and bulkhead per
//!   operation
//! - Apply runtime overrides and toggle files at registration time
//!
//! # Design Decisions
//! - Backed by a `DashMap` keyed by operation name; lookups during request
//!   handling never contend on a global lock
//! - Registration replaces any existing entry, resetting breaker and
//!   bulkhead state for that operation
//! - Clock, metrics and enablement are registry-wide; per-guard variation
//!   goes through `GuardBuilder` instead

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

use crate::classify::Fault;
use crate::clock::{Clock, TokioClock};
use crate::config::{
    load_overrides, validate_config, AlwaysEnabled, ConfigError, EnablementSource, OverrideSet,
    PolicyConfig, ToggleEnablement, Toggles,
};
use crate::observability::{FaultMetrics, RecorderMetrics};
use crate::pipeline::{FaultGuard, GuardCore};

/// Registry of guarded operations.
pub struct GuardRegistry {
    cores: DashMap<String, Arc<GuardCore>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn FaultMetrics>,
    enablement: Arc<dyn EnablementSource>,
    overrides: OverrideSet,
}

impl Default for GuardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self {
            cores: DashMap::new(),
            clock: Arc::new(TokioClock),
            metrics: Arc::new(RecorderMetrics),
            enablement: Arc::new(AlwaysEnabled),
            overrides: OverrideSet::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn FaultMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_enablement(mut self, source: Arc<dyn EnablementSource>) -> Self {
        self.enablement = source;
        self
    }

    /// Overrides applied to every subsequent registration.
    pub fn with_overrides(mut self, set: OverrideSet) -> Self {
        self.overrides = set;
        self
    }

    /// Load an override file and wire both the parameter overrides and the
    /// toggle table it carries.
    pub fn with_overrides_file(self, path: &Path) -> Result<Self, ConfigError> {
        let set = load_overrides(path)?;
        let enablement = Arc::new(ToggleEnablement::new(Toggles::from_overrides(&set)));
        Ok(self.with_enablement(enablement).with_overrides(set))
    }

    /// Register an operation. Overrides are resolved onto the declared
    /// parameters, the result validated, and fresh cross-call state built.
    /// Re-registering an operation replaces it.
    pub fn register(&self, config: PolicyConfig) -> Result<(), ConfigError> {
        let mut config = config;
        self.overrides.resolve(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;

        let operation = config.operation.clone();
        let core = Arc::new(GuardCore::new(
            config,
            self.clock.clone(),
            self.metrics.clone(),
            self.enablement.clone(),
        ));
        if self.cores.insert(operation.clone(), core).is_some() {
            tracing::info!(operation = %operation, "guard re-registered, state reset");
        } else {
            tracing::info!(operation = %operation, "guard registered");
        }
        Ok(())
    }

    /// Typed guard for a registered operation. Every call shares the
    /// operation's breaker and bulkhead state.
    pub fn guard<T, E: Fault>(&self, operation: &str) -> Option<FaultGuard<T, E>> {
        self.cores
            .get(operation)
            .map(|entry| FaultGuard::from_core(entry.value().clone()))
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.cores.contains_key(operation)
    }

    /// Remove an operation, dropping its cross-call state. Guards already
    /// handed out keep working against the detached state.
    pub fn deregister(&self, operation: &str) -> bool {
        self.cores.remove(operation).is_some()
    }

    pub fn operations(&self) -> Vec<String> {
        self.cores.iter().map(|e| e.key().clone()).collect()
    }
}
