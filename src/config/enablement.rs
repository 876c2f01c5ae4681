//! Per-policy enablement.
//!
//! # Responsibilities
//! - Answer "is this policy active for this operation right now?"
//! - Allow global and per-operation disabling without rebuilding guards
//!
//! # Design Decisions
//! - A disabled policy is skipped entirely in the composed chain, not
//!   no-opped: a disabled bulkhead does not bound concurrency at all
//! - `ToggleEnablement` keeps its table behind an `ArcSwap` so the per-call
//!   read is a lock-free pointer load and toggles can be hot-swapped

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::{OverrideSet, PolicyOverrides};

/// The policies a guarded operation may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Retry,
    CircuitBreaker,
    Bulkhead,
    Timeout,
    Fallback,
    Asynchronous,
}

/// Consulted per call (or cached) to decide whether a policy participates.
pub trait EnablementSource: Send + Sync + fmt::Debug {
    fn is_enabled(&self, operation: &str, policy: PolicyKind) -> bool;
}

/// Default source; every configured policy is active.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysEnabled;

impl EnablementSource for AlwaysEnabled {
    fn is_enabled(&self, _operation: &str, _policy: PolicyKind) -> bool {
        true
    }
}

/// Toggle table: per-operation entries win over global entries, absent
/// entries default to enabled.
#[derive(Debug, Default, Clone)]
pub struct Toggles {
    global: HashMap<PolicyKind, bool>,
    per_operation: HashMap<String, HashMap<PolicyKind, bool>>,
}

impl Toggles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global(&mut self, policy: PolicyKind, enabled: bool) {
        self.global.insert(policy, enabled);
    }

    pub fn set_operation(&mut self, operation: impl Into<String>, policy: PolicyKind, enabled: bool) {
        self.per_operation
            .entry(operation.into())
            .or_default()
            .insert(policy, enabled);
    }

    /// Collect `enabled` flags from an override file into a toggle table.
    pub fn from_overrides(set: &OverrideSet) -> Self {
        let mut toggles = Self::new();
        collect_flags(&set.global, |policy, enabled| {
            toggles.set_global(policy, enabled)
        });
        for (operation, overrides) in &set.operations {
            collect_flags(overrides, |policy, enabled| {
                toggles.set_operation(operation.clone(), policy, enabled)
            });
        }
        toggles
    }

    fn lookup(&self, operation: &str, policy: PolicyKind) -> bool {
        if let Some(ops) = self.per_operation.get(operation) {
            if let Some(&enabled) = ops.get(&policy) {
                return enabled;
            }
        }
        self.global.get(&policy).copied().unwrap_or(true)
    }
}

fn collect_flags(overrides: &PolicyOverrides, mut set: impl FnMut(PolicyKind, bool)) {
    if let Some(enabled) = overrides.retry.as_ref().and_then(|o| o.enabled) {
        set(PolicyKind::Retry, enabled);
    }
    if let Some(enabled) = overrides.circuit_breaker.as_ref().and_then(|o| o.enabled) {
        set(PolicyKind::CircuitBreaker, enabled);
    }
    if let Some(enabled) = overrides.bulkhead.as_ref().and_then(|o| o.enabled) {
        set(PolicyKind::Bulkhead, enabled);
    }
    if let Some(enabled) = overrides.timeout.as_ref().and_then(|o| o.enabled) {
        set(PolicyKind::Timeout, enabled);
    }
}

/// Hot-swappable enablement source.
pub struct ToggleEnablement {
    current: ArcSwap<Toggles>,
}

impl ToggleEnablement {
    pub fn new(toggles: Toggles) -> Self {
        Self {
            current: ArcSwap::from_pointee(toggles),
        }
    }

    /// Replace the toggle table; in-flight calls keep the snapshot they read.
    pub fn update(&self, toggles: Toggles) {
        self.current.store(Arc::new(toggles));
    }
}

impl fmt::Debug for ToggleEnablement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToggleEnablement")
            .field("current", &self.current.load())
            .finish()
    }
}

impl EnablementSource for ToggleEnablement {
    fn is_enabled(&self, operation: &str, policy: PolicyKind) -> bool {
        self.current.load().lookup(operation, policy)
    }
}
