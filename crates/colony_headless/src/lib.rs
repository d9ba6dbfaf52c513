//! Headless colony runner for scenario playback and CI verification.
//!
//! Plays RON scenarios against the logistics core without any renderer.
//! The runner stands in for the behavior layer: it walks each assigned
//! carrier through its pickup and dropoff legs, optionally failing every
//! Nth dropoff to exercise rollback.
//!
//! - **Scenario runs**: metrics as JSON on stdout, logs on stderr
//! - **Batch runs**: many scenario files in parallel with rayon
//! - **Determinism checks**: the same scenario must always end in the
//!   same state hash
//!
//! # Example
//!
//! ```bash
//! # Run a scenario
//! cargo run -p colony_headless -- run --scenario crates/colony_headless/scenarios/hamlet.ron
//!
//! # Verify determinism
//! cargo run -p colony_headless -- verify --scenario crates/colony_headless/scenarios/flaky_porters.ron --runs 5
//! ```

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, RunMetrics};
pub use runner::{run_scenario, RegionOracle, ScenarioRunner};
pub use scenario::{Scenario, ScenarioError};
