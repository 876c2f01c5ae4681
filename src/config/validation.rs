//! Policy configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic for override files)
//! - Validate value ranges before a guard is built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: PolicyConfig → Result<(), Vec<ValidationError>>
//! - Runs at registration time; an invalid config never produces a guard

use std::time::Duration;

use thiserror::Error;

use crate::config::schema::PolicyConfig;

/// A single semantic problem in a policy configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("retry.max_retries must be >= -1, got {0}")]
    RetryMaxRetries(i32),

    #[error("retry.max_duration ({max_duration:?}) must exceed retry.delay ({delay:?})")]
    RetryBudgetTooSmall {
        max_duration: Duration,
        delay: Duration,
    },

    #[error("circuit_breaker.failure_ratio must be within 0.0..=1.0, got {0}")]
    BreakerFailureRatio(f64),

    #[error("circuit_breaker.request_volume_threshold must be >= 1, got {0}")]
    BreakerVolumeThreshold(usize),

    #[error("circuit_breaker.success_threshold must be >= 1, got {0}")]
    BreakerSuccessThreshold(u32),

    #[error("bulkhead.capacity must be >= 1, got {0}")]
    BulkheadCapacity(usize),

    #[error("timeout.duration must be > 0")]
    TimeoutDuration,
}

/// Validate a resolved policy configuration, collecting every violation.
pub fn validate_config(config: &PolicyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(retry) = &config.retry {
        if retry.max_retries < -1 {
            errors.push(ValidationError::RetryMaxRetries(retry.max_retries));
        }
        if !retry.max_duration.is_zero() && retry.max_duration <= retry.delay {
            errors.push(ValidationError::RetryBudgetTooSmall {
                max_duration: retry.max_duration,
                delay: retry.delay,
            });
        }
    }

    if let Some(breaker) = &config.circuit_breaker {
        if !(0.0..=1.0).contains(&breaker.failure_ratio) {
            errors.push(ValidationError::BreakerFailureRatio(breaker.failure_ratio));
        }
        if breaker.request_volume_threshold < 1 {
            errors.push(ValidationError::BreakerVolumeThreshold(
                breaker.request_volume_threshold,
            ));
        }
        if breaker.success_threshold < 1 {
            errors.push(ValidationError::BreakerSuccessThreshold(
                breaker.success_threshold,
            ));
        }
    }

    if let Some(bulkhead) = &config.bulkhead {
        if bulkhead.capacity < 1 {
            errors.push(ValidationError::BulkheadCapacity(bulkhead.capacity));
        }
    }

    if let Some(timeout) = &config.timeout {
        if timeout.duration.is_zero() {
            errors.push(ValidationError::TimeoutDuration);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{
        BulkheadConfig, CircuitBreakerConfig, RetryConfig, TimeoutConfig,
    };

    #[test]
    fn default_policies_validate() {
        let mut config = PolicyConfig::new("op");
        config.retry = Some(RetryConfig::default());
        config.circuit_breaker = Some(CircuitBreakerConfig::default());
        config.bulkhead = Some(BulkheadConfig::default());
        config.timeout = Some(TimeoutConfig::default());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = PolicyConfig::new("op");
        config.retry = Some(RetryConfig {
            max_retries: -2,
            ..Default::default()
        });
        config.circuit_breaker = Some(CircuitBreakerConfig {
            failure_ratio: 1.5,
            request_volume_threshold: 0,
            ..Default::default()
        });
        config.bulkhead = Some(BulkheadConfig {
            capacity: 0,
            queue_capacity: 0,
        });
        config.timeout = Some(TimeoutConfig {
            duration: Duration::ZERO,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::RetryMaxRetries(-2)));
        assert!(errors.contains(&ValidationError::BulkheadCapacity(0)));
        assert!(errors.contains(&ValidationError::TimeoutDuration));
    }

    #[test]
    fn unlimited_retries_are_legal() {
        let mut config = PolicyConfig::new("op");
        config.retry = Some(RetryConfig {
            max_retries: -1,
            ..Default::default()
        });
        assert!(validate_config(&config).is_ok());
    }
}
