//! Response cache shared by all API clients
//!
//! A two-tier (in-memory + on-disk) key-value cache with per-entry TTL
//! expiry, hit/miss accounting, and a recurring background sweep. API clients
//! only ever go through [`CacheService::get`]/[`CacheService::set`]; the
//! cache has no awareness of HTTP or domain semantics.

pub mod service;
pub mod store;
pub mod sweep;

use std::time::Duration;

/// Cache TTL per resource type
///
/// Live readings expire in minutes; slowly-changing data keeps for hours or
/// days. Chosen per upstream publication cadence: NWIS gauges report every
/// 15 minutes, the Drought Monitor updates weekly, WQP results trail
/// sampling by days.
pub struct CacheTtl;

impl CacheTtl {
    /// Streamflow time series for one site
    pub const STREAMFLOW_SERIES: Duration = Duration::from_secs(15 * 60); // 15 min
    /// Latest readings across many sites
    pub const CURRENT_CONDITIONS: Duration = Duration::from_secs(10 * 60); // 10 min
    /// Water-quality sample results
    pub const WATER_QUALITY: Duration = Duration::from_secs(24 * 60 * 60); // 24 hr
    /// Drought severity by county
    pub const DROUGHT: Duration = Duration::from_secs(6 * 60 * 60); // 6 hr
    /// Fallback for anything without a dedicated TTL
    pub const DEFAULT: Duration = Duration::from_secs(30 * 60); // 30 min
}

pub use service::{CacheService, CacheStats, Cached};
pub use store::{DiskStore, MemoryStore, Store, StoreError, NAMESPACE_PREFIX};
pub use sweep::{SweepConfig, SweepHandle};
