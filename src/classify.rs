//! Failure classification against include/exclude fault-type lists.
//!
//! # Responsibilities
//! - Describe fault types as a hierarchy (each type has an optional parent)
//! - Decide whether a concrete fault counts as a "failure" for a policy,
//!   given that policy's include and exclude lists
//!
//! # Design Decisions
//! - Types are `&'static ErrorType` descriptors compared by pointer identity;
//!   a type matches a list entry when it is that entry or a descendant of it
//! - The exclude list wins whenever it matches, regardless of how specific
//!   the include match is; this reproduces the observed engine semantics
//!   (an exact include entry does not override an inherited exclude match)
//! - One classifier for all policies; only the list names differ
//!   (retry_on/abort_on, fail_on/skip_on, apply_on/skip_on)

/// A node in the fault-type hierarchy.
///
/// Statics are declared once and referenced everywhere, e.g.:
///
/// ```
/// use faultguard::classify::{ErrorType, ANY_FAULT};
///
/// pub static DB_ERROR: ErrorType = ErrorType::new("db", Some(&ANY_FAULT));
/// pub static DB_DEADLOCK: ErrorType = ErrorType::new("db.deadlock", Some(&DB_ERROR));
/// ```
#[derive(Debug)]
pub struct ErrorType {
    name: &'static str,
    parent: Option<&'static ErrorType>,
}

impl ErrorType {
    pub const fn new(name: &'static str, parent: Option<&'static ErrorType>) -> Self {
        Self { name, parent }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True when `self` is `ancestor` or any transitive descendant of it.
    pub fn is_a(&self, ancestor: &'static ErrorType) -> bool {
        let mut cur = Some(self);
        while let Some(ty) = cur {
            if std::ptr::eq(ty, ancestor) {
                return true;
            }
            cur = ty.parent.map(|p| p as &ErrorType);
        }
        false
    }
}

/// Root of the hierarchy; matches every fault.
pub static ANY_FAULT: ErrorType = ErrorType::new("any", None);

/// The timeout governor's distinguished failure type.
pub static TIMEOUT: ErrorType = ErrorType::new("timeout", Some(&ANY_FAULT));

/// Circuit-breaker rejection (the operation was never invoked).
pub static CIRCUIT_OPEN: ErrorType = ErrorType::new("circuit_open", Some(&ANY_FAULT));

/// Bulkhead rejection (capacity and queue exhausted).
pub static BULKHEAD_FULL: ErrorType = ErrorType::new("bulkhead_full", Some(&ANY_FAULT));

/// Caller-initiated cancellation.
pub static CANCELLED: ErrorType = ErrorType::new("cancelled", Some(&ANY_FAULT));

/// Implemented by user error types so policies can classify them.
pub trait Fault {
    fn fault_type(&self) -> &'static ErrorType;
}

impl Fault for &'static str {
    fn fault_type(&self) -> &'static ErrorType {
        &ANY_FAULT
    }
}

impl Fault for String {
    fn fault_type(&self) -> &'static ErrorType {
        &ANY_FAULT
    }
}

fn matches_any(ty: &'static ErrorType, list: &[&'static ErrorType]) -> bool {
    list.iter().any(|entry| ty.is_a(entry))
}

/// Decide whether `ty` counts as a failure for a policy.
///
/// The exclude list is consulted first and wins on any match; otherwise the
/// include list decides; a fault matching neither list is not a failure.
pub fn classify(
    ty: &'static ErrorType,
    include: &[&'static ErrorType],
    exclude: &[&'static ErrorType],
) -> bool {
    if matches_any(ty, exclude) {
        return false;
    }
    matches_any(ty, include)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test hierarchy: E0 ⊃ E1 ⊃ E2, plus an E0-only sibling of E1.
    static E0: ErrorType = ErrorType::new("e0", Some(&ANY_FAULT));
    static E1: ErrorType = ErrorType::new("e1", Some(&E0));
    static E2: ErrorType = ErrorType::new("e2", Some(&E1));
    static E0_ONLY: ErrorType = ErrorType::new("e0_only", Some(&E0));

    #[test]
    fn subtype_walks_parent_chain() {
        assert!(E2.is_a(&E2));
        assert!(E2.is_a(&E1));
        assert!(E2.is_a(&E0));
        assert!(E2.is_a(&ANY_FAULT));
        assert!(!E0.is_a(&E1));
        assert!(!E0_ONLY.is_a(&E1));
    }

    #[test]
    fn hierarchy_scenario_from_breaker_contract() {
        // fail_on = {E0, E2}, skip_on = {E1}
        let include: &[&'static ErrorType] = &[&E0, &E2];
        let exclude: &[&'static ErrorType] = &[&E1];

        // E1 is skipped: exact skip entry.
        assert!(!classify(&E1, include, exclude));
        // E2 is skipped: the inherited E1 skip beats the exact E2 fail entry.
        assert!(!classify(&E2, include, exclude));
        // A subtype of E0 outside the E1 branch fails.
        assert!(classify(&E0_ONLY, include, exclude));
    }

    #[test]
    fn defaults_include_everything() {
        let include: &[&'static ErrorType] = &[&ANY_FAULT];
        assert!(classify(&E2, include, &[]));
        assert!(classify(&TIMEOUT, include, &[]));
        assert!(classify(&CIRCUIT_OPEN, include, &[]));
    }

    #[test]
    fn empty_include_matches_nothing() {
        assert!(!classify(&E0, &[], &[]));
    }

    #[test]
    fn exclude_only_branch_is_cut_out() {
        // Retrying everything except timeouts.
        let include: &[&'static ErrorType] = &[&ANY_FAULT];
        let exclude: &[&'static ErrorType] = &[&TIMEOUT];
        assert!(classify(&E0, include, exclude));
        assert!(!classify(&TIMEOUT, include, exclude));
    }
}
