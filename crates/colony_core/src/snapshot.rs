//! Ledger and colony snapshots for persistence.
//!
//! A [`LedgerSnapshot`] is the persisted form of one ledger: the raw
//! quantities and policies. Derived desire deltas are not stored; they are
//! recomputed on restore. A [`ColonySnapshot`] bundles every container and
//! carrier and is encoded with bincode.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capacity::CapacityPolicy;
use crate::colony::{Carrier, Colony, Container, ContainerKind, LogisticsProfile};
use crate::desire::Desire;
use crate::error::{ColonyError, LedgerError, Result};
use crate::ids::{CarrierId, ContainerId};
use crate::inventory::Inventory;
use crate::ledger::InventoryLedger;
use crate::math::Vec2Fixed;
use crate::permission::PermissionPolicy;
use crate::promise::PromisePair;

/// Snapshot format version. Bump when the layout changes.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Persisted fields of one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Everything physically present.
    pub held: Inventory,
    /// Stock locked for outbound transfers.
    pub forbidden: Inventory,
    /// Space promised to inbound transfers.
    pub reserved_capacity: Inventory,
    /// Capacity policy.
    pub all_capacity: CapacityPolicy,
    /// Permission policy.
    pub permission: PermissionPolicy,
    /// Desired composition.
    pub desire_target: Inventory,
    /// Whether the desire takes part in matching.
    pub desire_active: bool,
}

impl InventoryLedger {
    /// Capture the persisted fields.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        let desire = self.desire();
        LedgerSnapshot {
            held: self.held(),
            forbidden: self.forbidden(),
            reserved_capacity: self.reserved_capacity(),
            all_capacity: self.all_capacity(),
            permission: self.permission(),
            desire_target: desire.target,
            desire_active: desire.is_active,
        }
    }

    /// Rebuild a ledger, refusing snapshots that break the invariants.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvariantViolated`] if the stored quantities
    /// are inconsistent.
    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> std::result::Result<Self, LedgerError> {
        let mut desire = Desire::new(snapshot.desire_target);
        desire.is_active = snapshot.desire_active;
        Self::from_parts(
            snapshot.held,
            snapshot.forbidden,
            snapshot.reserved_capacity,
            snapshot.all_capacity,
            snapshot.permission,
            desire,
        )
    }
}

/// Persisted container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// Container id.
    pub id: ContainerId,
    /// Display name.
    pub name: String,
    /// Owning entity kind.
    pub kind: ContainerKind,
    /// World location.
    pub location: Vec2Fixed,
    /// Worklist ordering keys.
    pub profile: LogisticsProfile,
    /// The ledger.
    pub ledger: LedgerSnapshot,
}

/// Persisted carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSnapshot {
    /// Carrier id.
    pub id: CarrierId,
    /// The carrier's inventory container.
    pub container: ContainerId,
    /// In-flight promise pair.
    pub active: Option<PromisePair>,
}

/// Full persisted colony state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonySnapshot {
    /// Format version.
    pub version: u32,
    /// Colony tick at capture.
    pub tick: u64,
    /// Next promise id to hand out.
    pub next_promise: u64,
    /// Containers in id order.
    pub containers: Vec<ContainerSnapshot>,
    /// Carriers in id order.
    pub carriers: Vec<CarrierSnapshot>,
}

impl ColonySnapshot {
    /// Capture `colony`.
    #[must_use]
    pub fn capture(colony: &Colony) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tick: colony.tick(),
            next_promise: colony.next_promise(),
            containers: colony
                .containers()
                .map(|c| ContainerSnapshot {
                    id: c.id,
                    name: c.name.clone(),
                    kind: c.kind,
                    location: c.location,
                    profile: c.profile,
                    ledger: c.ledger().snapshot(),
                })
                .collect(),
            carriers: colony
                .carriers()
                .map(|c| CarrierSnapshot {
                    id: c.id,
                    container: c.container,
                    active: c.active,
                })
                .collect(),
        }
    }

    /// Rebuild a colony.
    ///
    /// # Errors
    ///
    /// Returns an error if a ledger breaks its invariants, a carrier
    /// refers to a missing container, or the locks on the ledgers do not
    /// match the carriers' promise pairs.
    pub fn restore(&self) -> Result<Colony> {
        if self.version != SNAPSHOT_VERSION {
            return Err(ColonyError::Snapshot(format!(
                "Snapshot version mismatch: expected {}, got {}",
                SNAPSHOT_VERSION, self.version
            )));
        }

        let mut containers = BTreeMap::new();
        for c in &self.containers {
            let ledger = InventoryLedger::from_snapshot(&c.ledger)
                .map_err(|e| ColonyError::ledger(c.id, e))?;
            containers.insert(
                c.id,
                Container {
                    id: c.id,
                    name: c.name.clone(),
                    kind: c.kind,
                    location: c.location,
                    profile: c.profile,
                    ledger,
                },
            );
        }

        let mut carriers = BTreeMap::new();
        for c in &self.carriers {
            if !containers.contains_key(&c.container) {
                return Err(ColonyError::UnknownContainer(c.container));
            }
            carriers.insert(
                c.id,
                Carrier {
                    id: c.id,
                    container: c.container,
                    active: c.active,
                },
            );
        }

        let colony = Colony::from_parts(self.tick, containers, carriers, self.next_promise);
        colony.audit()?;
        Ok(colony)
    }

    /// Encode with bincode.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| ColonyError::Snapshot(format!("Failed to serialize snapshot: {e}")))
    }

    /// Decode from bincode.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| ColonyError::Snapshot(format!("Failed to deserialize snapshot: {e}")))
    }

    /// Write the encoded snapshot to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| ColonyError::Snapshot(format!("Failed to write snapshot file: {e}")))
    }

    /// Read a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if file reading or deserialization fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| ColonyError::Snapshot(format!("Failed to read snapshot file: {e}")))?;
        Self::from_bytes(&bytes)
    }
}
