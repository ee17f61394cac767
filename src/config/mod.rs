//! Configuration management
//!
//! Handles rtadv.toml (user-defined tunables) and the lock rendering with
//! every default filled in.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::{Error, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<RtadvConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Parse configuration from TOML text; missing keys take their defaults
pub fn parse(content: &str) -> Result<RtadvConfig> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

/// Render the effective configuration, all defaults filled in
pub fn generate_lock(config: &RtadvConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, RtadvConfig::default());
        assert_eq!(config.solicitation.max_solicitations, 3);
        assert_eq!(config.solicitation.interval(), Duration::from_secs(4));
        assert_eq!(config.socket.close_delay(), Duration::from_secs(1));
        assert_eq!(config.pvd.min_refetch(), Duration::from_secs(10));
        assert_eq!(config.pvd.default_expiration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_partial_override() {
        let config = parse(
            r#"
            [solicitation]
            max_solicitations = 5
            acquisition_failure_timeout_secs = 20

            [clat46]
            enabled = false

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.solicitation.max_solicitations, 5);
        assert_eq!(config.solicitation.interval_secs, 4);
        assert_eq!(
            config.solicitation.acquisition_failure_timeout(),
            Duration::from_secs(20)
        );
        assert!(!config.clat46.enabled);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_parse_rejects_bad_type() {
        let err = parse("[solicitation]\nmax_solicitations = \"three\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_lock_round_trips_defaults() {
        let lock = generate_lock(&RtadvConfig::default()).unwrap();
        assert!(lock.contains("max_solicitations = 3"));
        assert_eq!(parse(&lock).unwrap(), RtadvConfig::default());
    }
}
