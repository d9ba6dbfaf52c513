//! Run metrics for headless scenarios.
//!
//! Collected per run and serialized as JSON so CI can diff runs and track
//! logistics throughput over time.

use std::path::Path;

use colony_core::matcher::MatchReport;
use serde::{Deserialize, Serialize};

/// Metrics for a single scenario run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Promise pairs issued.
    pub assignments: u64,
    /// Units locked for transfer.
    pub units_assigned: u64,
    /// Units stored at their target.
    pub units_delivered: u64,
    /// Transfers rolled back.
    pub rollbacks: u64,
    /// Item piles spawned from dropped goods.
    pub piles_spawned: u64,
    /// Receive entries skipped for lack of a reachable source and carrier.
    pub skipped_receives: u64,
    /// Feasibility cache hits summed over all ticks.
    pub cache_hits: u64,
    /// Feasibility cache misses summed over all ticks.
    pub cache_misses: u64,
    /// Receive units still unmatched at the last tick.
    pub pending_receive: u64,
    /// Tick of the last assignment, if any.
    pub last_assignment_tick: Option<u64>,
    /// Whether the end-of-run audit found no leaked locks.
    pub audit_passed: bool,
    /// Final colony state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl RunMetrics {
    /// Create metrics for a scenario.
    #[must_use]
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            ..Default::default()
        }
    }

    /// Fold in one matching tick.
    pub fn record_tick(&mut self, report: &MatchReport) {
        self.ticks = self.ticks.max(report.tick);
        self.assignments += report.assignments.len() as u64;
        self.units_assigned += report.units_assigned();
        self.skipped_receives += report.skipped.len() as u64;
        self.cache_hits += report.cache.hits;
        self.cache_misses += report.cache.misses;
        self.pending_receive = report.pending_receive;
        if !report.assignments.is_empty() {
            self.last_assignment_tick = Some(report.tick);
        }
    }

    /// Share of feasibility lookups answered from the cache.
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Save to a pretty-printed JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Aggregate over many runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Runs aggregated.
    pub runs: usize,
    /// Runs whose audit passed.
    pub clean_runs: usize,
    /// Units delivered across all runs.
    pub total_units_delivered: u64,
    /// Rollbacks across all runs.
    pub total_rollbacks: u64,
    /// Mean delivered units per run.
    pub mean_units_delivered: f64,
    /// Mean cache hit rate per run.
    pub mean_cache_hit_rate: f64,
}

impl BatchSummary {
    /// Summarize a set of runs.
    #[must_use]
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }
        let count = runs.len() as f64;
        let total_units_delivered = runs.iter().map(|r| r.units_delivered).sum();
        Self {
            runs: runs.len(),
            clean_runs: runs.iter().filter(|r| r.audit_passed).count(),
            total_units_delivered,
            total_rollbacks: runs.iter().map(|r| r.rollbacks).sum(),
            mean_units_delivered: total_units_delivered as f64 / count,
            mean_cache_hit_rate: runs.iter().map(RunMetrics::cache_hit_rate).sum::<f64>() / count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_core::navigation::CacheStats;

    #[test]
    fn test_record_tick() {
        let mut metrics = RunMetrics::new("test");
        metrics.record_tick(&MatchReport {
            tick: 3,
            skipped: vec![],
            pending_receive: 7,
            cache: CacheStats { hits: 3, misses: 1 },
            ..MatchReport::default()
        });
        assert_eq!(metrics.ticks, 3);
        assert_eq!(metrics.pending_receive, 7);
        assert_eq!(metrics.last_assignment_tick, None);
        assert!((metrics.cache_hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary() {
        let runs = vec![
            RunMetrics {
                units_delivered: 10,
                audit_passed: true,
                ..RunMetrics::new("a")
            },
            RunMetrics {
                units_delivered: 20,
                rollbacks: 2,
                ..RunMetrics::new("b")
            },
        ];
        let summary = BatchSummary::from_runs(&runs);
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.clean_runs, 1);
        assert_eq!(summary.total_rollbacks, 2);
        assert!((summary.mean_units_delivered - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_json_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.json");
        let metrics = RunMetrics {
            assignments: 4,
            final_state_hash: 42,
            ..RunMetrics::new("disk")
        };
        metrics.save(&path).unwrap();
        assert_eq!(RunMetrics::load(&path).unwrap(), metrics);
    }
}
