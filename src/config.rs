//! Configuration
//!
//! All configuration is immutable once built and is shared freely between
//! concurrent callers. Every struct has a `Default`; override single fields
//! with struct update syntax:
//!
//! ```
//! use binttl::config::{ExpireBinConfig, SweeperConfig};
//! use std::time::Duration;
//!
//! let config = ExpireBinConfig {
//!     sweep: SweeperConfig {
//!         base_interval: Duration::from_secs(5),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! assert_eq!(config.module, "expire_bin");
//! ```

use std::time::Duration;

/// Name under which the expire-bin module is registered with the store.
pub const DEFAULT_MODULE_NAME: &str = "expire_bin";

/// Access policy forwarded with every atomic call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPolicy {
    /// Upper bound on a single atomic call, lock wait included. A call that
    /// runs over fails with `StoreUnavailable` and commits nothing.
    pub timeout: Option<Duration>,
}

/// Policy for a collection scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPolicy {
    /// Stop after visiting this many records.
    pub max_records: Option<usize>,

    /// Only ship these bins to the scan callback (empty = all bins).
    pub bin_names: Vec<String>,
}

/// Configuration for the background expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Base interval between sweeps (default: 60s)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 1s)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 10min)
    pub max_interval: Duration,

    /// If this fraction of scanned records had bins purged, speed up sweeping
    pub speedup_threshold: f64,

    /// If this fraction of scanned records had bins purged, slow down sweeping
    pub slowdown_threshold: f64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(60),
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(600),
            speedup_threshold: 0.25,  // Speed up if >25% of records needed purging
            slowdown_threshold: 0.01, // Slow down if <1% of records needed purging
        }
    }
}

/// Top-level configuration for an [`ExpireBin`](crate::ExpireBin) client.
#[derive(Debug, Clone)]
pub struct ExpireBinConfig {
    /// Module name used for atomic calls.
    pub module: String,

    /// Policy forwarded with every atomic call.
    pub policy: ApplyPolicy,

    /// Background sweeper settings.
    pub sweep: SweeperConfig,
}

impl Default for ExpireBinConfig {
    fn default() -> Self {
        Self {
            module: DEFAULT_MODULE_NAME.to_string(),
            policy: ApplyPolicy::default(),
            sweep: SweeperConfig::default(),
        }
    }
}
