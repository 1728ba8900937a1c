//! Tunables for matching and for the engine cache.
//!
//! The defaults reproduce the long-standing behaviour of the classic toolkit
//! font cache. The bitmap-scale tolerance and the sweep's shrink divisor
//! were chosen empirically and are exposed here so hosts can tune them.

use std::time::Duration;

use crate::OperatingSystem;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchConfig {
    /// Resolution used to turn point sizes into pixel sizes
    pub dpi: f32,
    /// If the closest fixed size is at least this many percent away from the
    /// requested size, a bitmap-scalable style is scaled instead
    pub bitmap_scale_tolerance_percent: u32,
    /// Stop searching families once a candidate scores below this
    pub early_exit_score: u32,
    /// Tried after the requested families, before style-hint fallbacks
    pub default_family: Option<String>,
    /// Tried after the script-only search. `None` = first sans-serif family
    /// known for the configured operating system
    pub last_resort_family: Option<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            dpi: 96.0,
            bitmap_scale_tolerance_percent: 20,
            early_exit_score: 10,
            default_family: None,
            last_resort_family: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Floor for the floating cost budget, in KB
    pub min_cost_kb: u32,
    /// Each productive sweep divides the budget by this (bounded below by the
    /// in-use cost and by `min_cost_kb`)
    pub shrink_divisor: u32,
    /// Sweep period while the cache is actively shrinking
    pub fast_sweep_interval: Duration,
    /// Sweep period once nothing more can be reclaimed
    pub slow_sweep_interval: Duration,
    /// Bytes charged for every engine-data bundle
    pub engine_data_cost: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            min_cost_kb: 4 * 1024,
            shrink_divisor: 2,
            fast_sweep_interval: Duration::from_secs(10),
            slow_sweep_interval: Duration::from_secs(300),
            engine_data_cost: 1024,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolverConfig {
    pub matching: MatchConfig,
    pub cache: CacheConfig,
    pub os: OperatingSystem,
}

impl ResolverConfig {
    /// The family tried when everything else failed.
    pub fn last_resort_family(&self) -> Option<String> {
        self.matching
            .last_resort_family
            .clone()
            .or_else(|| self.os.last_resort_family())
    }
}
