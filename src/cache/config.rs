//! Cache region configuration.

use std::time::Duration;

use super::ConfigurationError;

/// Default maximum number of entries in a region.
pub const DEFAULT_MAX_SIZE: usize = 200;

/// Default time-to-live for region entries (30 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Configuration for a single cache region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConfig {
    /// Maximum number of entries in the region.
    pub max_size: usize,

    /// Time-to-live for entries.
    /// After this duration since insertion, entries are treated as absent.
    pub ttl: Duration,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl: DEFAULT_TTL,
        }
    }
}

impl RegionConfig {
    /// Create a new region config with the given size bound and ttl.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self { max_size, ttl }
    }

    /// Create a new region config with the given max size and the default ttl.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size,
            ..Default::default()
        }
    }

    /// Set max size for the region (builder pattern).
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set time-to-live for region entries.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Check the config is usable for the named region.
    pub fn validate(&self, region: &str) -> Result<(), ConfigurationError> {
        if self.max_size == 0 {
            return Err(ConfigurationError::InvalidMaxSize {
                region: region.to_string(),
            });
        }
        if self.ttl.is_zero() {
            return Err(ConfigurationError::InvalidTtl {
                region: region.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = RegionConfig::default();
        assert_eq!(config.max_size, 200);
        assert_eq!(config.ttl, Duration::from_secs(1800));
        assert!(config.validate("patientsById").is_ok());
    }

    #[test]
    fn builder_overrides_fields() {
        let config = RegionConfig::with_max_size(5).ttl(Duration::from_secs(10));
        assert_eq!(config, RegionConfig::new(5, Duration::from_secs(10)));
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = RegionConfig::default().max_size(0).validate("offices").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidMaxSize {
                region: "offices".to_string()
            }
        );
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = RegionConfig::default()
            .ttl(Duration::ZERO)
            .validate("offices")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidTtl { .. }));
    }
}
