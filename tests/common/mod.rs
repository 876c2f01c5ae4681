//! Shared helpers for integration tests.
#![allow(dead_code)]

use faultguard::{ErrorType, Fault, ANY_FAULT};

// A small fault hierarchy: service ⊃ transient ⊃ network_blip.
pub static SERVICE_ERROR: ErrorType = ErrorType::new("service", Some(&ANY_FAULT));
pub static TRANSIENT_ERROR: ErrorType = ErrorType::new("transient", Some(&SERVICE_ERROR));
pub static NETWORK_BLIP: ErrorType = ErrorType::new("network_blip", Some(&TRANSIENT_ERROR));

/// Test error carrying its classification.
#[derive(Debug, Clone)]
pub struct TestError(pub &'static ErrorType);

impl PartialEq for TestError {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Fault for TestError {
    fn fault_type(&self) -> &'static ErrorType {
        self.0
    }
}
