//! Scenario playback.
//!
//! The [`ScenarioRunner`] plays the behavior layer that the core leaves
//! external: every tick it runs the matcher, then walks each busy carrier
//! through its pickup and dropoff legs, reporting completions and failures
//! back to the colony.

use std::collections::BTreeMap;

use colony_core::prelude::*;
use std::result::Result;

use crate::metrics::RunMetrics;
use crate::scenario::{Region, Scenario, ScenarioError};

/// Path oracle over walkable regions: two points are connected iff they
/// lie in the same region. Points outside every region are unreachable.
///
/// With no regions at all, everything is connected.
#[derive(Debug, Clone, Default)]
pub struct RegionOracle {
    regions: Vec<Region>,
}

impl RegionOracle {
    /// Create an oracle over `regions`.
    #[must_use]
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    fn region_of(&self, point: Vec2Fixed) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(point))
    }
}

impl PathOracle for RegionOracle {
    fn is_path_feasible(&self, from: Vec2Fixed, to: Vec2Fixed) -> bool {
        if self.regions.is_empty() {
            return true;
        }
        match (self.region_of(from), self.region_of(to)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Progress of one carrier through its promise pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Trip {
    source: ContainerId,
    target: ContainerId,
    ticks_left: u32,
}

/// Plays a scenario tick by tick.
#[derive(Debug)]
pub struct ScenarioRunner {
    scenario: Scenario,
    colony: Colony,
    matcher: LogisticsMatcher,
    oracle: RegionOracle,
    trips: BTreeMap<CarrierId, Trip>,
    dropoffs: u64,
    metrics: RunMetrics,
}

impl ScenarioRunner {
    /// Build the scenario's colony.
    pub fn new(scenario: Scenario) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let colony = scenario.build_colony();
        Ok(Self {
            matcher: LogisticsMatcher::new(scenario.matcher),
            oracle: RegionOracle::new(scenario.regions.clone()),
            metrics: RunMetrics::new(scenario.name.clone()),
            trips: BTreeMap::new(),
            dropoffs: 0,
            colony,
            scenario,
        })
    }

    /// The colony being simulated.
    #[must_use]
    pub const fn colony(&self) -> &Colony {
        &self.colony
    }

    /// Metrics so far.
    #[must_use]
    pub const fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Advance one tick: match, then move every busy carrier.
    pub fn step(&mut self) -> Result<(), ColonyError> {
        let tick = self.colony.advance_tick();
        let report = self.matcher.run_tick(&mut self.colony, &self.oracle);
        self.metrics.record_tick(&report);

        for assignment in &report.assignments {
            self.trips.insert(
                assignment.carrier,
                Trip {
                    source: assignment.source,
                    target: assignment.target,
                    ticks_left: self.scenario.leg_ticks,
                },
            );
        }

        let carriers: Vec<CarrierId> = self.trips.keys().copied().collect();
        for carrier in carriers {
            self.advance_trip(tick, carrier)?;
        }

        for event in self.colony.take_events() {
            if matches!(event, ColonyEvent::PileSpawned { .. }) {
                self.metrics.piles_spawned += 1;
            }
        }
        Ok(())
    }

    fn advance_trip(&mut self, tick: u64, carrier: CarrierId) -> Result<(), ColonyError> {
        let Some(trip) = self.trips.get_mut(&carrier) else {
            return Ok(());
        };
        trip.ticks_left = trip.ticks_left.saturating_sub(1);
        if trip.ticks_left > 0 {
            return Ok(());
        }
        let trip = *trip;

        let stage = self
            .colony
            .carrier(carrier)?
            .active_promise()
            .map(|pair| pair.stage);
        match stage {
            Some(PairStage::AwaitingPickup) => {
                let location = self.colony.container(trip.source)?.location;
                self.colony.move_carrier(carrier, location)?;
                self.colony.complete_pickup(carrier)?;
                if let Some(next) = self.trips.get_mut(&carrier) {
                    next.ticks_left = self.scenario.leg_ticks;
                }
            }
            Some(PairStage::AwaitingDropoff) => {
                self.trips.remove(&carrier);
                self.dropoffs += 1;
                let fails = self
                    .scenario
                    .failure_every
                    .is_some_and(|n| self.dropoffs % u64::from(n) == 0);
                if fails {
                    tracing::info!(tick, carrier = %carrier, "Simulated dropoff failure");
                    self.colony.fail_promise(carrier)?;
                    self.metrics.rollbacks += 1;
                } else {
                    let location = self.colony.container(trip.target)?.location;
                    self.colony.move_carrier(carrier, location)?;
                    let stored = self.colony.complete_dropoff(carrier, Disposition::Store)?;
                    self.metrics.units_delivered += stored.total();
                }
            }
            None => {
                // Rolled back elsewhere, e.g. a despawn
                self.trips.remove(&carrier);
            }
        }
        Ok(())
    }

    /// Play the scenario for its configured number of ticks.
    pub fn run(self) -> Result<RunMetrics, ColonyError> {
        let ticks = self.scenario.ticks;
        self.run_for(ticks)
    }

    /// Play `ticks` ticks, then audit and hash the final state.
    pub fn run_for(mut self, ticks: u64) -> Result<RunMetrics, ColonyError> {
        tracing::info!(scenario = %self.scenario.name, ticks, "Starting scenario");
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(self.finish())
    }

    /// Audit the colony, record the final hash and return the metrics.
    #[must_use]
    pub fn finish(mut self) -> RunMetrics {
        self.metrics.audit_passed = match self.colony.audit() {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(scenario = %self.scenario.name, error = %err, "Audit failed");
                false
            }
        };
        self.metrics.ticks = self.colony.tick();
        self.metrics.final_state_hash = self.colony.state_hash();
        tracing::info!(
            scenario = %self.scenario.name,
            delivered = self.metrics.units_delivered,
            rollbacks = self.metrics.rollbacks,
            hash = self.metrics.final_state_hash,
            "Scenario finished"
        );
        self.metrics
    }

    /// Write the current colony to a binary snapshot.
    pub fn save_snapshot(&self, path: &std::path::Path) -> Result<(), ColonyError> {
        ColonySnapshot::capture(&self.colony).save(path)?;
        tracing::info!(path = %path.display(), tick = self.colony.tick(), "Saved snapshot");
        Ok(())
    }

    /// Stop early and return the colony alongside its metrics.
    pub fn into_parts(self) -> (Colony, RunMetrics) {
        (self.colony, self.metrics)
    }
}

/// Run a scenario to completion.
pub fn run_scenario(scenario: Scenario, ticks: Option<u64>) -> Result<RunMetrics, ScenarioError> {
    let ticks = ticks.unwrap_or(scenario.ticks);
    Ok(ScenarioRunner::new(scenario)?.run_for(ticks)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_oracle() {
        let oracle = RegionOracle::new(vec![
            Region::new("a", (0, 0), (10, 10)),
            Region::new("b", (20, 0), (30, 10)),
        ]);
        let p = Vec2Fixed::from_ints;
        assert!(oracle.is_path_feasible(p(1, 1), p(9, 9)));
        assert!(!oracle.is_path_feasible(p(1, 1), p(25, 5)));
        assert!(!oracle.is_path_feasible(p(15, 5), p(15, 6)));
        assert!(RegionOracle::default().is_path_feasible(p(0, 0), p(100, 100)));
    }

    #[test]
    fn test_hamlet_delivers_and_stays_clean() {
        let metrics = run_scenario(Scenario::hamlet(), Some(120)).unwrap();
        assert!(metrics.audit_passed);
        assert!(metrics.units_delivered > 0);
        assert_eq!(metrics.rollbacks, 0);
        // The quarry is walled off, so stone stays short
        assert!(metrics.pending_receive > 0);
        assert!(metrics.skipped_receives > 0);
    }

    #[test]
    fn test_failures_are_rolled_back() {
        let scenario = Scenario {
            failure_every: Some(2),
            ..Scenario::hamlet()
        };
        let metrics = run_scenario(scenario, Some(150)).unwrap();
        assert!(metrics.rollbacks > 0);
        assert!(metrics.piles_spawned > 0);
        assert!(metrics.audit_passed);
    }

    #[test]
    fn test_goods_are_conserved() {
        let scenario = Scenario {
            failure_every: Some(3),
            ..Scenario::hamlet()
        };
        let before = scenario.build_colony().total_held();
        let mut runner = ScenarioRunner::new(scenario).unwrap();
        for _ in 0..80 {
            runner.step().unwrap();
        }
        let (colony, _) = runner.into_parts();
        assert_eq!(colony.total_held(), before);
    }

    #[test]
    fn test_snapshot_resumes_mid_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hamlet.snap");
        let mut runner = ScenarioRunner::new(Scenario::hamlet()).unwrap();
        for _ in 0..10 {
            runner.step().unwrap();
        }
        runner.save_snapshot(&path).unwrap();

        let restored = ColonySnapshot::load(&path).unwrap().restore().unwrap();
        assert_eq!(restored.state_hash(), runner.colony().state_hash());
    }

    #[test]
    fn test_runs_are_reproducible() {
        let a = run_scenario(Scenario::hamlet(), Some(60)).unwrap();
        let b = run_scenario(Scenario::hamlet(), Some(60)).unwrap();
        assert_eq!(a, b);
    }
}
