//! Periodic cost-driven cleanup of the engine cache.
//!
//! The cache does not own a timer. It records whether a sweep is pending and
//! at which period; the host calls [`EngineCache::poll_sweep`] from its event
//! loop (or [`FontResolver::spawn_sweeper`](crate::FontResolver::spawn_sweeper)
//! runs a thread that does).
//!
//! Each sweep lowers the budget towards `max(max / divisor, in_use, floor)`
//! and evicts the oldest, least popular unreferenced engines until the total
//! cost fits. Referenced entries are never touched.

use std::time::{Duration, Instant};

use crate::cache::{EngineCache, EngineCacheKey};
use crate::config::CacheConfig;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum SweepPeriod {
    /// The cache is actively shrinking
    Fast,
    /// Nothing more could be reclaimed last time
    Slow,
}

impl SweepPeriod {
    pub fn interval(&self, config: &CacheConfig) -> Duration {
        match self {
            SweepPeriod::Fast => config.fast_sweep_interval,
            SweepPeriod::Slow => config.slow_sweep_interval,
        }
    }
}

/// Timer state, `period == None` means stopped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepTimer {
    pub period: Option<SweepPeriod>,
    pub due: Option<Instant>,
}

impl SweepTimer {
    /// Restarts at the fast period unless already running fast.
    pub(crate) fn arm_fast(&mut self, now: Instant, config: &CacheConfig) {
        if self.period != Some(SweepPeriod::Fast) {
            log::debug!(
                "font cache: starting fast sweep timer ({:?})",
                config.fast_sweep_interval
            );
            self.start(SweepPeriod::Fast, now, config);
        }
    }

    fn start(&mut self, period: SweepPeriod, now: Instant, config: &CacheConfig) {
        self.period = Some(period);
        self.due = Some(now + period.interval(config));
    }

    fn stop(&mut self) {
        self.period = None;
        self.due = None;
    }
}

/// What one sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Cost of everything still referenced, in KB
    pub in_use_kb: u32,
    pub total_before_kb: u32,
    pub total_after_kb: u32,
    pub max_before_kb: u32,
    pub max_after_kb: u32,
    pub bundles_deleted: usize,
    pub key_entries_removed: usize,
    pub engines_deleted: usize,
    /// Timer period after the sweep, `None` = stopped
    pub period: Option<SweepPeriod>,
}

impl EngineCache {
    pub fn sweep_period(&self) -> Option<SweepPeriod> {
        self.timer.period
    }

    /// When the next sweep is due, `None` if the timer is stopped.
    pub fn next_sweep_due(&self) -> Option<Instant> {
        self.timer.due
    }

    /// Whether a sweep is due at `now`.
    pub fn needs_sweep(&self, now: Instant) -> bool {
        matches!(self.timer.due, Some(due) if now >= due)
    }

    /// Runs a sweep if one is due at `now`.
    pub fn poll_sweep(&mut self, now: Instant) -> Option<SweepReport> {
        if self.needs_sweep(now) {
            Some(self.sweep_at(now))
        } else {
            None
        }
    }

    /// Runs a sweep immediately.
    pub fn sweep(&mut self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&mut self, now: Instant) -> SweepReport {
        log::debug!(
            "font cache: performing cache maintenance (timestamp {})",
            self.current_timestamp
        );

        let mut report = SweepReport {
            total_before_kb: self.total_cost,
            max_before_kb: self.max_cost,
            ..Default::default()
        };

        let floor = self.config.min_cost_kb;
        if self.total_cost <= self.max_cost && self.max_cost <= floor {
            log::debug!("font cache: reduced sufficiently, stopping timer");
            self.timer.stop();
            return self.finish(report);
        }

        report.in_use_kb = self.in_use_cost_kb();

        let divisor = self.config.shrink_divisor.max(1);
        let new_max = (self.max_cost / divisor)
            .max(report.in_use_kb)
            .max(floor);

        log::debug!(
            "font cache: in use {} kb, total {} kb, max {} kb, new max {} kb",
            report.in_use_kb,
            self.total_cost,
            self.max_cost,
            new_max
        );

        if new_max == self.max_cost {
            if self.timer.period != Some(SweepPeriod::Slow) {
                log::debug!("font cache: cannot shrink cache, slowing timer");
            }
            self.timer.start(SweepPeriod::Slow, now, &self.config);
            return self.finish(report);
        }

        if self.timer.period != Some(SweepPeriod::Fast) {
            log::debug!("font cache: dropping into fast sweeps");
        }
        self.timer.start(SweepPeriod::Fast, now, &self.config);
        self.max_cost = new_max;

        report.bundles_deleted = self.delete_unused_engine_data();

        while self.total_cost > self.max_cost {
            let (key, index) = match self.eviction_candidate() {
                Some(c) => c,
                None => break,
            };
            report.key_entries_removed += 1;
            if self.remove_key_entry(&key, index) {
                report.engines_deleted += 1;
            }
        }

        self.finish(report)
    }

    fn finish(&self, mut report: SweepReport) -> SweepReport {
        report.total_after_kb = self.total_cost;
        report.max_after_kb = self.max_cost;
        report.period = self.timer.period;
        report
    }

    /// Cost of referenced bundles and engines, in KB. A multiply-keyed
    /// engine is split across its key entries, plus one byte per entry for
    /// rounding.
    fn in_use_cost_kb(&self) -> u32 {
        let bundle_cost = self.config.engine_data_cost.max(1024) as u64;
        let mut in_use: u64 = self
            .data
            .values()
            .filter(|d| d.ref_count() != 0)
            .map(|_| bundle_cost)
            .sum();

        let mut entries: u64 = 0;
        for entry in self.keys.values().flatten() {
            entries += 1;
            if let Some(cached) = self.engines.get(&entry.id) {
                if cached.ref_count() != 0 {
                    in_use += (cached.cost / cached.cache_count.max(1)) as u64;
                }
            }
        }
        in_use += entries;

        ((in_use + 1023) / 1024).min(u32::MAX as u64) as u32
    }

    fn delete_unused_engine_data(&mut self) -> usize {
        let unused: Vec<_> = self
            .data
            .iter()
            .filter(|(_, d)| d.ref_count() == 0)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &unused {
            if let Some(cached) = self.data.remove(key) {
                cached.clear_engines();
                log::debug!("font cache: deleting engine data for '{}'", key.families);
                self.decrease_cost(self.config.engine_data_cost);
            }
        }
        unused.len()
    }

    /// The unreferenced key entry with the smallest (timestamp, hits).
    fn eviction_candidate(&self) -> Option<(EngineCacheKey, usize)> {
        let mut best: Option<(&EngineCacheKey, usize, (u64, u32))> = None;

        for (key, entries) in &self.keys {
            for (index, entry) in entries.iter().enumerate() {
                let unreferenced = self
                    .engines
                    .get(&entry.id)
                    .map(|c| c.ref_count() == 0)
                    .unwrap_or(false);
                if !unreferenced {
                    continue;
                }
                let rank = (entry.timestamp, entry.hits);
                match best {
                    Some((_, _, r)) if r <= rank => {}
                    _ => best = Some((key, index, rank)),
                }
            }
        }

        best.map(|(key, index, _)| (key.clone(), index))
    }
}
