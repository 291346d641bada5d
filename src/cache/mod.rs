//! Cache module - Named, bounded, time-limited cache regions.
//!
//! This module provides a registry-based caching system that lets the
//! service layer front repeated read lookups with independent regions.
//!
//! ## Architecture
//!
//! The cache system follows a registry pattern:
//! - `CacheManager` - Central registry holding all named regions
//! - `CacheRegion` - A typed region with an LRU size bound and a ttl
//! - `LoadCoalescer` - Per-region single-flight table used by `get_or_load`
//!
//! Every region is created at startup from a `RegionConfig`; callers look it
//! up by name and either read/write it directly or go through `get_or_load`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let patients = manager.create_region::<i64, Patient>("patientsById", RegionConfig::default())?;
//!
//! // Read through the cache
//! let patient = patients.get_or_load(42, move || async move { store.patient(42).await }).await?;
//!
//! // After a write to the underlying data
//! patients.invalidate(&42);
//! ```

mod coalescer;
mod config;
mod entry;
mod error;
mod manager;
mod region;
mod stats;

pub use config::{DEFAULT_MAX_SIZE, DEFAULT_TTL, RegionConfig};
pub use entry::CacheEntry;
pub use error::{ConfigurationError, LoadError};
pub use manager::{CacheManager, Sweeper};
pub use region::CacheRegion;
pub use stats::RegionStats;
