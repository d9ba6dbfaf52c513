//! Batch scenario runner.
//!
//! Plays many scenarios in parallel with rayon and aggregates their
//! logistics metrics.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::metrics::{BatchSummary, RunMetrics};
use crate::runner::run_scenario;
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Tick override applied to every scenario.
    pub ticks: Option<u64>,
    /// Play scenarios on the rayon pool instead of one after another.
    pub parallel: bool,
}

/// Error from one scenario in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Scenario file or name.
    pub scenario: String,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Per-scenario metrics, in input order.
    pub runs: Vec<RunMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
    /// Scenarios that failed to load or play.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

fn play(path: &Path, ticks: Option<u64>) -> Result<RunMetrics, BatchError> {
    let scenario = path.display().to_string();
    Scenario::load(path)
        .and_then(|s| run_scenario(s, ticks))
        .map_err(|e| BatchError {
            scenario,
            message: e.to_string(),
        })
}

/// Play every scenario file in `paths`.
pub fn run_batch(paths: &[PathBuf], config: &BatchConfig) -> BatchResults {
    info!(scenarios = paths.len(), parallel = config.parallel, "Starting batch");
    let start = Instant::now();

    let outcomes: Vec<Result<RunMetrics, BatchError>> = if config.parallel {
        paths.par_iter().map(|p| play(p, config.ticks)).collect()
    } else {
        paths.iter().map(|p| play(p, config.ticks)).collect()
    };

    let mut runs = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(metrics) => runs.push(metrics),
            Err(err) => {
                warn!(scenario = %err.scenario, error = %err.message, "Scenario failed");
                errors.push(err);
            }
        }
    }

    let summary = BatchSummary::from_runs(&runs);
    info!(
        runs = summary.runs,
        clean = summary.clean_runs,
        errors = errors.len(),
        "Batch complete"
    );
    BatchResults {
        config: config.clone(),
        runs,
        summary,
        duration_seconds: start.elapsed().as_secs_f64(),
        errors,
    }
}

/// Play `scenario` `runs` times and check every run ends in the same state.
pub fn verify_determinism(
    scenario: &Scenario,
    ticks: Option<u64>,
    runs: u32,
) -> Result<bool, ScenarioError> {
    let hashes = (0..runs.max(1))
        .into_par_iter()
        .map(|_| run_scenario(scenario.clone(), ticks).map(|m| m.final_state_hash))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(&first) = hashes.first() else {
        return Ok(true);
    };
    if let Some((run, hash)) = hashes.iter().enumerate().find(|(_, &h)| h != first) {
        warn!(run, expected = first, actual = *hash, "Run diverged");
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_scenario(dir: &Path, name: &str, failure_every: Option<u32>) -> PathBuf {
        let scenario = Scenario {
            name: name.to_string(),
            failure_every,
            ..Scenario::hamlet()
        };
        let path = dir.join(format!("{name}.ron"));
        let text = ron::ser::to_string_pretty(&scenario, ron::ser::PrettyConfig::default()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_scenario(dir.path(), "calm", None),
            write_scenario(dir.path(), "flaky", Some(2)),
        ];

        let sequential = run_batch(&paths, &BatchConfig { ticks: Some(80), parallel: false });
        let parallel = run_batch(&paths, &BatchConfig { ticks: Some(80), parallel: true });

        assert!(sequential.errors.is_empty());
        assert_eq!(sequential.runs, parallel.runs);
        assert_eq!(sequential.summary.runs, 2);
        assert_eq!(sequential.runs[0].scenario, "calm");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_scenario(dir.path(), "ok", None),
            dir.path().join("missing.ron"),
        ];

        let results = run_batch(&paths, &BatchConfig { ticks: Some(10), parallel: true });

        assert_eq!(results.runs.len(), 1);
        assert_eq!(results.errors.len(), 1);
        assert!(results.errors[0].message.contains("not found"));

        let out = dir.path().join("out").join("batch.json");
        results.save(&out).unwrap();
        let loaded = BatchResults::load(&out).unwrap();
        assert_eq!(loaded.errors, results.errors);
    }

    #[test]
    fn test_verify_determinism() {
        let scenario = Scenario {
            failure_every: Some(4),
            ..Scenario::hamlet()
        };
        assert!(verify_determinism(&scenario, Some(50), 3).unwrap());
    }
}
