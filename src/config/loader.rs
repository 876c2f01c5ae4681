//! Override loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::OverrideSet;
use crate::config::validation::ValidationError;

/// Error type for configuration loading and guard construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load runtime policy overrides from a TOML file.
pub fn load_overrides(path: &Path) -> Result<OverrideSet, ConfigError> {
    let content = fs::read_to_string(path)?;
    overrides_from_str(&content)
}

/// Parse runtime policy overrides from a TOML string.
pub fn overrides_from_str(content: &str) -> Result<OverrideSet, ConfigError> {
    let overrides: OverrideSet = toml::from_str(content)?;
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PolicyConfig, RetryConfig, TimeoutConfig};
    use std::time::Duration;

    #[test]
    fn parses_global_and_operation_sections() {
        let toml = r#"
            [global.retry]
            max_retries = 2

            [global.timeout]
            duration_ms = 750

            [operations."payments.charge".retry]
            max_retries = 3
            jitter_ms = 0

            [operations."payments.charge".circuit_breaker]
            enabled = false
        "#;

        let set = overrides_from_str(toml).unwrap();
        assert_eq!(set.global.retry.as_ref().unwrap().max_retries, Some(2));

        let op = &set.operations["payments.charge"];
        assert_eq!(op.retry.as_ref().unwrap().max_retries, Some(3));
        assert_eq!(op.circuit_breaker.as_ref().unwrap().enabled, Some(false));

        let mut config = PolicyConfig::new("payments.charge");
        config.retry = Some(RetryConfig {
            max_retries: 5,
            ..Default::default()
        });
        config.timeout = Some(TimeoutConfig::default());

        set.resolve(&mut config);
        assert_eq!(config.retry.unwrap().max_retries, 3);
        assert_eq!(config.timeout.unwrap().duration, Duration::from_millis(750));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = overrides_from_str("[global.retry\nmax_retries = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
