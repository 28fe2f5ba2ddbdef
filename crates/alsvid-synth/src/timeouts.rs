//! Per-size timeout management and timing statistics.
//!
//! Every SAT check records its solving time per target size. Under dynamic
//! timeouts, a SAT result at size *k* caps the timeout for *k* and every
//! smaller size at `factor` times the adjusted mean (the base timeout is
//! folded into the mean until enough samples exist, so early outliers do
//! not shrink the budget prematurely). Timeouts are monotone non-increasing
//! in the size and never drop below the minimal timeout.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::config::Config;

/// Timing ledger and per-size timeout table.
#[derive(Debug)]
pub struct TimeManager {
    total: Duration,
    totalised: Duration,
    solving: Duration,
    encoding: Duration,
    integration: Duration,
    equivalence_logging: Duration,

    timeout_per_size: FxHashMap<usize, Duration>,
    sat_timings: FxHashMap<usize, Vec<Duration>>,
    unsat_timings: FxHashMap<usize, Vec<Duration>>,
    timeouts_hit: FxHashMap<usize, usize>,

    use_timeouts: bool,
    dynamic: bool,
    base: Duration,
    minimal: Duration,
    factor: f64,
    adjust_until: usize,
}

impl TimeManager {
    /// Build from the session configuration.
    pub fn new(cfg: &Config) -> Self {
        Self {
            total: Duration::ZERO,
            totalised: Duration::ZERO,
            solving: Duration::ZERO,
            encoding: Duration::ZERO,
            integration: Duration::ZERO,
            equivalence_logging: Duration::ZERO,
            timeout_per_size: FxHashMap::default(),
            sat_timings: FxHashMap::default(),
            unsat_timings: FxHashMap::default(),
            timeouts_hit: FxHashMap::default(),
            use_timeouts: cfg.use_timeouts,
            dynamic: cfg.use_dynamic_timeouts,
            base: cfg.base_timeout,
            minimal: cfg.minimal_timeout,
            factor: cfg.timeout_factor,
            adjust_until: cfg.adjust_until,
        }
    }

    /// Whether checks run under a timeout at all.
    pub fn use_timeouts(&self) -> bool {
        self.use_timeouts
    }

    /// Whether a timeout has been fixed for this size.
    pub fn is_timeout_set(&self, size: usize) -> bool {
        self.timeout_per_size.contains_key(&size)
    }

    /// Seed the timeout of a size with the base value.
    pub fn init_timeout(&mut self, size: usize) {
        self.timeout_per_size.insert(size, self.base);
    }

    /// The current timeout of a size (base when none was fixed yet).
    pub fn timeout_for(&self, size: usize) -> Duration {
        self.timeout_per_size
            .get(&size)
            .copied()
            .unwrap_or(self.base)
    }

    /// Record a SAT solving time without touching the timeout table.
    pub fn log_sat(&mut self, size: usize, time: Duration) {
        self.totalised += time;
        self.solving += time;
        self.sat_timings.entry(size).or_default().push(time);
    }

    /// Record an UNSAT solving time.
    pub fn log_unsat(&mut self, size: usize, time: Duration) {
        self.totalised += time;
        self.solving += time;
        self.unsat_timings.entry(size).or_default().push(time);
    }

    /// Record a timed-out check: the full budget counts as solving time.
    pub fn log_timeout(&mut self, size: usize) {
        let budget = self.timeout_for(size);
        self.totalised += budget;
        self.solving += budget;
        *self.timeouts_hit.entry(size).or_default() += 1;
    }

    /// Record encoding time.
    pub fn log_encoding(&mut self, time: Duration) {
        self.totalised += time;
        self.encoding += time;
    }

    /// Record splice time.
    pub fn log_integration(&mut self, time: Duration) {
        self.totalised += time;
        self.integration += time;
    }

    /// Record time spent on equivalence logging.
    pub fn log_equivalence(&mut self, time: Duration) {
        self.totalised += time;
        self.equivalence_logging += time;
    }

    /// Add to the overall reduction time.
    pub fn add_total(&mut self, time: Duration) {
        self.total += time;
    }

    /// Mean SAT time and sample count at a size.
    pub fn sat_stats(&self, size: usize) -> Option<(Duration, usize)> {
        let timings = self.sat_timings.get(&size)?;
        if timings.is_empty() {
            return None;
        }
        let sum: Duration = timings.iter().sum();
        Some((sum / timings.len() as u32, timings.len()))
    }

    /// Record a SAT time and, under dynamic timeouts, tighten the timeout
    /// of this and every smaller size.
    pub fn record_sat(&mut self, size: usize, time: Duration) {
        self.log_sat(size, time);
        if !self.dynamic {
            for i in (0..=size).rev() {
                self.timeout_per_size.entry(i).or_insert(self.base);
            }
            return;
        }
        let timings = &self.sat_timings[&size];
        let sum: Duration = timings.iter().sum();
        let adjusted_mean = if timings.len() > self.adjust_until {
            sum / timings.len() as u32
        } else {
            (sum + self.base) / (timings.len() as u32 + 1)
        };
        let mut cap = adjusted_mean.mul_f64(self.factor).min(self.base);
        cap = cap.max(self.minimal);
        for i in (0..=size).rev() {
            self.timeout_per_size
                .entry(i)
                .and_modify(|t| *t = (*t).min(cap))
                .or_insert(cap);
        }
    }

    /// Print the timing report the way the session expects it.
    pub fn report(&self) {
        println!("Time: {:.3}s", self.total.as_secs_f64());
        println!(
            "Summed component timings: {:.3}s",
            self.totalised.as_secs_f64()
        );
        println!("Solving time: {:.3}s", self.solving.as_secs_f64());
        println!("Encoding time: {:.3}s", self.encoding.as_secs_f64());
        println!(
            "Circuit integration time: {:.3}s",
            self.integration.as_secs_f64()
        );
        println!(
            "Time logging equivalent replacements: {:.3}s",
            self.equivalence_logging.as_secs_f64()
        );

        let mut sizes: Vec<usize> = self
            .sat_timings
            .keys()
            .chain(self.unsat_timings.keys())
            .copied()
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        for size in sizes {
            let empty = vec![];
            let sat = self.sat_timings.get(&size).unwrap_or(&empty);
            let unsat = self.unsat_timings.get(&size).unwrap_or(&empty);
            let checks = sat.len() + unsat.len();
            let total: Duration = sat.iter().chain(unsat.iter()).sum();
            println!(
                "Size: {size}; checks: {checks}; total time: {:.3}s; average time: {:.3}s",
                total.as_secs_f64(),
                total.as_secs_f64() / checks as f64,
            );
        }

        let mut sizes: Vec<usize> = self.timeout_per_size.keys().copied().collect();
        sizes.sort_unstable();
        for size in sizes {
            println!(
                "Size: {size}; timeout: {:.3}s",
                self.timeout_per_size[&size].as_secs_f64()
            );
        }
        let mut sizes: Vec<usize> = self.timeouts_hit.keys().copied().collect();
        sizes.sort_unstable();
        for size in sizes {
            println!(
                "Size: {size}; recorded timeouts: {}",
                self.timeouts_hit[&size]
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TimeManager {
        let cfg = Config {
            base_timeout: Duration::from_secs(120),
            minimal_timeout: Duration::from_secs(1),
            timeout_factor: 1.4,
            adjust_until: 50,
            ..Config::default()
        };
        TimeManager::new(&cfg)
    }

    #[test]
    fn test_static_mode_uses_base_everywhere() {
        let cfg = Config {
            use_dynamic_timeouts: false,
            ..Config::default()
        };
        let mut tm = TimeManager::new(&cfg);
        tm.record_sat(4, Duration::from_secs(1));
        for size in 0..=4 {
            assert_eq!(tm.timeout_for(size), cfg.base_timeout);
        }
    }

    #[test]
    fn test_dynamic_update_folds_base_into_mean() {
        let mut tm = manager();
        tm.record_sat(4, Duration::from_secs(1));
        // Adjusted mean (1 + 120) / 2 = 60.5s; capped at 1.4 * 60.5 = 84.7s.
        let t = tm.timeout_for(4);
        assert!((t.as_secs_f64() - 84.7).abs() < 0.01, "{t:?}");
        // Smaller sizes inherit the cap.
        assert_eq!(tm.timeout_for(2), t);
    }

    #[test]
    fn test_dynamic_update_is_monotone_decreasing() {
        let mut tm = manager();
        tm.record_sat(4, Duration::from_secs(1));
        let first = tm.timeout_for(4);
        tm.record_sat(4, Duration::from_secs(1));
        let second = tm.timeout_for(4);
        assert!(second < first);
        assert!(second >= Duration::from_secs(1));
        // A later large sample must not loosen the timeout again.
        tm.record_sat(4, Duration::from_secs(3_000));
        assert!(tm.timeout_for(4) <= second);
    }

    #[test]
    fn test_minimal_timeout_clamp() {
        let cfg = Config {
            base_timeout: Duration::from_secs(120),
            minimal_timeout: Duration::from_secs(5),
            adjust_until: 0,
            ..Config::default()
        };
        let mut tm = TimeManager::new(&cfg);
        tm.record_sat(3, Duration::from_millis(1));
        assert_eq!(tm.timeout_for(3), Duration::from_secs(5));
    }

    #[test]
    fn test_smaller_sizes_never_exceed_larger() {
        let mut tm = manager();
        tm.record_sat(5, Duration::from_secs(2));
        tm.record_sat(3, Duration::from_secs(1));
        assert!(tm.timeout_for(2) <= tm.timeout_for(3));
        assert!(tm.timeout_for(3) <= tm.timeout_for(5));
    }

    #[test]
    fn test_sat_stats() {
        let mut tm = manager();
        assert!(tm.sat_stats(4).is_none());
        tm.log_sat(4, Duration::from_secs(2));
        tm.log_sat(4, Duration::from_secs(4));
        let (mean, samples) = tm.sat_stats(4).unwrap();
        assert_eq!(samples, 2);
        assert_eq!(mean, Duration::from_secs(3));
    }

    #[test]
    fn test_timeout_bookkeeping() {
        let mut tm = manager();
        tm.init_timeout(4);
        tm.log_timeout(4);
        tm.log_timeout(4);
        assert_eq!(tm.timeouts_hit[&4], 2);
        assert_eq!(tm.solving, 2 * tm.timeout_for(4));
    }
}
