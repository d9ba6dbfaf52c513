//! Scenario loading and configuration.
//!
//! Scenarios define the initial colony for headless runs: containers,
//! carriers, navigation regions, and how the simulated behavior layer moves
//! carriers.

use std::path::Path;

use colony_core::prelude::*;
use std::result::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario describes an impossible colony.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    /// The colony rejected an operation while the scenario played.
    #[error("Simulation failed: {0}")]
    Simulation(#[from] ColonyError),
}

/// An axis-aligned walkable area. Paths exist only within one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region name, for logs.
    pub name: String,
    /// Lower-left corner, inclusive.
    pub min: (i32, i32),
    /// Upper-right corner, inclusive.
    pub max: (i32, i32),
}

impl Region {
    /// Create a region.
    #[must_use]
    pub fn new(name: &str, min: (i32, i32), max: (i32, i32)) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
        }
    }

    /// True if `point` lies inside the region.
    #[must_use]
    pub fn contains(&self, point: Vec2Fixed) -> bool {
        let min = Vec2Fixed::from_ints(self.min.0, self.min.1);
        let max = Vec2Fixed::from_ints(self.max.0, self.max.1);
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }
}

/// Placement of one container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerPlacement {
    /// Display name.
    pub name: String,
    /// Owning entity kind.
    pub kind: ContainerKind,
    /// Grid position.
    pub position: (i32, i32),
    /// Capacity policy.
    pub capacity: CapacityPolicy,
    /// Permission policy.
    pub permission: PermissionPolicy,
    /// Desired composition.
    pub target: Inventory,
    /// Whether the container takes part in matching.
    pub active: bool,
    /// Starting stock.
    pub held: Inventory,
    /// Served after non-cache containers.
    pub is_cache: bool,
    /// Higher is served first.
    pub priority: i32,
}

impl Default for ContainerPlacement {
    fn default() -> Self {
        Self {
            name: "container".to_string(),
            kind: ContainerKind::Building,
            position: (0, 0),
            capacity: CapacityPolicy::Unlimited,
            permission: PermissionPolicy::all(),
            target: Inventory::EMPTY,
            active: true,
            held: Inventory::EMPTY,
            is_cache: false,
            priority: 0,
        }
    }
}

impl ContainerPlacement {
    fn spec(&self) -> ContainerSpec {
        let mut desire = Desire::new(self.target);
        desire.is_active = self.active;
        ContainerSpec {
            name: self.name.clone(),
            kind: self.kind,
            location: Vec2Fixed::from_ints(self.position.0, self.position.1),
            capacity: self.capacity,
            permission: self.permission,
            desire,
            held: self.held,
            profile: LogisticsProfile {
                is_cache: self.is_cache,
                priority: self.priority,
            },
        }
    }
}

/// Placement of one carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierPlacement {
    /// Display name.
    pub name: String,
    /// Grid position.
    pub position: (i32, i32),
    /// How much the carrier holds at once.
    pub capacity: CapacityPolicy,
}

impl Default for CarrierPlacement {
    fn default() -> Self {
        Self {
            name: "carrier".to_string(),
            position: (0, 0),
            capacity: CapacityPolicy::TotalWeight(20),
        }
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Ticks to simulate.
    pub ticks: u64,
    /// Ticks a carrier spends on each leg of a transfer.
    pub leg_ticks: u32,
    /// Every Nth dropoff fails and is rolled back.
    pub failure_every: Option<u32>,
    /// Matching configuration.
    pub matcher: MatcherConfig,
    /// Walkable regions. Empty means everything is connected.
    pub regions: Vec<Region>,
    /// Containers, spawned in order.
    pub containers: Vec<ContainerPlacement>,
    /// Carriers, spawned after the containers.
    pub carriers: Vec<CarrierPlacement>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::hamlet()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reject scenarios the runner cannot play.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.leg_ticks == 0 {
            return Err(ScenarioError::Invalid("leg_ticks must be at least 1".into()));
        }
        if self.failure_every == Some(0) {
            return Err(ScenarioError::Invalid("failure_every must be at least 1".into()));
        }
        if let Some(region) = self.regions.iter().find(|r| r.min.0 > r.max.0 || r.min.1 > r.max.1) {
            return Err(ScenarioError::Invalid(format!(
                "region '{}' has min beyond max",
                region.name
            )));
        }
        Ok(())
    }

    /// A small settlement: two construction sites fed from a stockpile and
    /// a scattered pile, with a walled-off quarry.
    #[must_use]
    pub fn hamlet() -> Self {
        use ResourceType::{Food, Stone, Wood};

        Self {
            name: "Hamlet".to_string(),
            description: "Two sites, one stockpile, a pile and an unreachable quarry".to_string(),
            ticks: 200,
            leg_ticks: 3,
            failure_every: None,
            matcher: MatcherConfig::default(),
            regions: vec![
                Region::new("village", (-50, -50), (50, 50)),
                Region::new("quarry", (80, -10), (100, 10)),
            ],
            containers: vec![
                ContainerPlacement {
                    name: "house site".to_string(),
                    position: (0, 10),
                    capacity: CapacityPolicy::per_type(&[(Wood, 12), (Stone, 6)]),
                    permission: PermissionPolicy::deposit_only(&[Role::Carrier, Role::Builder]),
                    target: Inventory::from_pairs(&[(Wood, 12), (Stone, 6)]),
                    priority: 2,
                    ..Default::default()
                },
                ContainerPlacement {
                    name: "well site".to_string(),
                    position: (20, -10),
                    capacity: CapacityPolicy::per_type(&[(Stone, 10)]),
                    permission: PermissionPolicy::deposit_only(&[Role::Carrier, Role::Builder]),
                    target: Inventory::single(Stone, 10),
                    priority: 1,
                    ..Default::default()
                },
                ContainerPlacement {
                    name: "stockpile".to_string(),
                    kind: ContainerKind::Stockpile,
                    position: (-20, 0),
                    capacity: CapacityPolicy::TotalWeight(200),
                    target: Inventory::single(Food, 10),
                    held: Inventory::from_pairs(&[(Wood, 20), (Stone, 4), (Food, 15)]),
                    is_cache: true,
                    ..Default::default()
                },
                ContainerPlacement {
                    name: "fallen tree".to_string(),
                    kind: ContainerKind::Pile,
                    position: (10, 30),
                    permission: PermissionPolicy::withdraw_only(&[Role::Carrier]),
                    held: Inventory::single(Wood, 5),
                    ..Default::default()
                },
                ContainerPlacement {
                    name: "quarry".to_string(),
                    position: (90, 0),
                    permission: PermissionPolicy::withdraw_only(&[Role::Carrier]),
                    held: Inventory::single(Stone, 40),
                    ..Default::default()
                },
            ],
            carriers: vec![
                CarrierPlacement {
                    name: "porter 1".to_string(),
                    position: (-5, 0),
                    ..Default::default()
                },
                CarrierPlacement {
                    name: "porter 2".to_string(),
                    position: (5, 0),
                    ..Default::default()
                },
            ],
        }
    }

    /// Spawn the scenario's containers and carriers into a fresh colony.
    #[must_use]
    pub fn build_colony(&self) -> Colony {
        let mut colony = Colony::new();
        for placement in &self.containers {
            colony.spawn_container(placement.spec());
        }
        for placement in &self.carriers {
            colony.spawn_carrier(CarrierSpec {
                name: placement.name.clone(),
                location: Vec2Fixed::from_ints(placement.position.0, placement.position.1),
                capacity: placement.capacity,
            });
        }
        colony
    }
}
