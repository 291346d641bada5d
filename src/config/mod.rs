//! Configuration module for the cache service.
//!
//! Loads configuration from environment variables.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{ConfigurationError, DEFAULT_MAX_SIZE, DEFAULT_TTL, RegionConfig};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Per-region override, as written in `CACHE_REGION_OVERRIDES`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionOverride {
    pub max_size: Option<usize>,
    pub ttl_secs: Option<u64>,
}

/// Sizing for all cache regions: one shared default plus per-name overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub default: RegionConfig,
    pub overrides: HashMap<String, RegionOverride>,
    /// `None` disables the periodic sweeper.
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default: RegionConfig::default(),
            overrides: HashMap::new(),
            sweep_interval: Some(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)),
        }
    }
}

impl CacheSettings {
    /// Config for `name`: its override merged over the shared default.
    pub fn region_config(&self, name: &str) -> RegionConfig {
        let mut config = self.default;
        if let Some(o) = self.overrides.get(name) {
            if let Some(max_size) = o.max_size {
                config.max_size = max_size;
            }
            if let Some(ttl_secs) = o.ttl_secs {
                config.ttl = Duration::from_secs(ttl_secs);
            }
        }
        config
    }

    /// Reject overrides that name a region the application never creates.
    pub fn validate_overrides(&self, known: &[&str]) -> Result<(), ConfigurationError> {
        let mut unknown: Vec<&String> = self
            .overrides
            .keys()
            .filter(|name| !known.contains(&name.as_str()))
            .collect();
        unknown.sort();

        match unknown.first() {
            Some(name) => Err(ConfigurationError::UnknownOverride((*name).clone())),
            None => Ok(()),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cache: CacheSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `.env` is not read here; the binary loads it once at startup.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_size = parse_or(&lookup, "CACHE_DEFAULT_MAX_SIZE", DEFAULT_MAX_SIZE)?;
        let ttl_secs = parse_or(&lookup, "CACHE_DEFAULT_TTL_SECS", DEFAULT_TTL.as_secs())?;
        let sweep_secs = parse_or(&lookup, "CACHE_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;

        let overrides = match lookup("CACHE_REGION_OVERRIDES").filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => serde_json::from_str::<HashMap<String, RegionOverride>>(&raw).map_err(|e| {
                ConfigurationError::InvalidSetting {
                    key: "CACHE_REGION_OVERRIDES".to_string(),
                    reason: e.to_string(),
                }
            })?,
            None => HashMap::new(),
        };

        let cache = CacheSettings {
            default: RegionConfig::new(max_size, Duration::from_secs(ttl_secs)),
            overrides,
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        };

        Ok(Self { cache })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigurationError::InvalidSetting {
                key: key.to_string(),
                reason: format!("{raw:?}: {e}"),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigurationError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.cache, CacheSettings::default());
        assert_eq!(config.cache.default.max_size, 200);
        assert_eq!(config.cache.default.ttl, Duration::from_secs(1800));
    }

    #[test]
    fn reads_defaults_and_overrides() {
        let config = load(&[
            ("CACHE_DEFAULT_MAX_SIZE", "50"),
            ("CACHE_DEFAULT_TTL_SECS", "120"),
            ("CACHE_SWEEP_INTERVAL_SECS", "0"),
            (
                "CACHE_REGION_OVERRIDES",
                r#"{"patientsById": {"max_size": 500}, "offices": {"ttl_secs": 3600}}"#,
            ),
        ])
        .unwrap();

        let cache = &config.cache;
        assert_eq!(cache.sweep_interval, None);
        assert_eq!(
            cache.region_config("patientsById"),
            RegionConfig::new(500, Duration::from_secs(120))
        );
        assert_eq!(
            cache.region_config("offices"),
            RegionConfig::new(50, Duration::from_secs(3600))
        );
        assert_eq!(
            cache.region_config("doctors"),
            RegionConfig::new(50, Duration::from_secs(120))
        );
    }

    #[test]
    fn from_env_reads_the_process_environment() {
        // SAFETY: no other test in this crate reads or writes the process environment.
        unsafe { env::set_var("CACHE_DEFAULT_TTL_SECS", "45") };
        let config = Config::from_env();
        unsafe { env::remove_var("CACHE_DEFAULT_TTL_SECS") };

        assert_eq!(config.unwrap().cache.default.ttl, Duration::from_secs(45));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = load(&[("CACHE_DEFAULT_MAX_SIZE", "-3")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidSetting { ref key, .. } if key == "CACHE_DEFAULT_MAX_SIZE"
        ));
    }

    #[test]
    fn rejects_malformed_overrides() {
        let err = load(&[("CACHE_REGION_OVERRIDES", r#"{"offices": {"size": 1}}"#)]).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSetting { .. }));
    }

    #[test]
    fn unknown_override_names_are_reported() {
        let config = load(&[("CACHE_REGION_OVERRIDES", r#"{"pateintsById": {"max_size": 5}}"#)]).unwrap();

        let err = config
            .cache
            .validate_overrides(&["patientsById", "doctors"])
            .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownOverride("pateintsById".to_string()));
    }
}
