//! Cache error types.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while setting up or looking up cache regions.
///
/// These are startup-time failures: a misconfigured region name or size
/// should stop the process rather than be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("cache region '{0}' is already registered")]
    DuplicateRegion(String),

    #[error("cache region '{0}' is not registered")]
    UnknownRegion(String),

    #[error("cache region '{region}' must have a positive max size")]
    InvalidMaxSize { region: String },

    #[error("cache region '{region}' must have a non-zero ttl")]
    InvalidTtl { region: String },

    #[error("cache region '{region}' holds {actual}, requested as {expected}")]
    TypeMismatch {
        region: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("override given for unknown cache region '{0}'")]
    UnknownOverride(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

/// A loader failure observed through `get_or_load`.
///
/// Every caller waiting on the same load receives a clone of the same error,
/// so the underlying [`anyhow::Error`] is shared behind an `Arc`.
#[derive(Clone)]
pub struct LoadError {
    region: Arc<str>,
    source: Arc<anyhow::Error>,
}

impl LoadError {
    pub(crate) fn new(region: Arc<str>, source: anyhow::Error) -> Self {
        Self {
            region,
            source: Arc::new(source),
        }
    }

    /// Name of the region whose loader failed.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The error returned by the loader.
    pub fn cause(&self) -> &anyhow::Error {
        &self.source
    }

    /// Attempt to view the loader's error as a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.source.downcast_ref::<E>()
    }

    /// Whether two errors came from the same failed load.
    pub fn same_failure(&self, other: &LoadError) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadError")
            .field("region", &self.region)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loading into cache region '{}' failed: {}", self.region, self.source)
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let inner: &(dyn std::error::Error + Send + Sync + 'static) = (*self.source).as_ref();
        Some(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct DbDown;

    impl fmt::Display for DbDown {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("database unavailable")
        }
    }

    impl std::error::Error for DbDown {}

    #[test]
    fn load_error_keeps_original_cause() {
        let err = LoadError::new(Arc::from("patientsById"), anyhow::Error::new(DbDown));

        assert_eq!(err.region(), "patientsById");
        assert!(err.downcast_ref::<DbDown>().is_some());
        assert_eq!(
            err.to_string(),
            "loading into cache region 'patientsById' failed: database unavailable"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn clones_share_the_failure() {
        let err = LoadError::new(Arc::from("doctors"), anyhow::anyhow!("timeout"));
        let other = LoadError::new(Arc::from("doctors"), anyhow::anyhow!("timeout"));

        assert!(err.same_failure(&err.clone()));
        assert!(!err.same_failure(&other));
    }

    #[test]
    fn configuration_error_messages() {
        let err = ConfigurationError::UnknownRegion("offices".to_string());
        assert_eq!(err.to_string(), "cache region 'offices' is not registered");

        let err = ConfigurationError::InvalidMaxSize {
            region: "offices".to_string(),
        };
        assert_eq!(err.to_string(), "cache region 'offices' must have a positive max size");
    }
}
