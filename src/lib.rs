//! Clinic Cache - In-process caching for clinic read lookups.
//!
//! Repeated lookups of patients, doctors, offices, specializations and
//! patient-card history are fronted by named, bounded, time-limited regions.
//!
//! ## Architecture
//!
//! - `cache` - Region store (LRU + ttl), single-flight loading, region registry
//! - `config` - Environment configuration
//! - `clinic` - Region catalog, entities, and the read-through directory

pub mod cache;
pub mod clinic;
pub mod config;
