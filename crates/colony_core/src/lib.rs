//! # Colony Core
//!
//! Deterministic inventory reservation and logistics matching for a colony
//! simulation.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond optional snapshot files
//! - No randomness
//! - No floating-point math (positions use fixed-point)
//!
//! Every container owns an [`InventoryLedger`](ledger::InventoryLedger)
//! that tracks held, forbidden and reserved stock. Once per tick the
//! [`LogisticsMatcher`](matcher::LogisticsMatcher) pairs containers short
//! of a resource with containers holding a surplus, locks both ends and
//! hands an idle carrier a promise pair. The behavior layer walks the
//! carrier and reports back through [`Colony`](colony::Colony).
//!
//! ## Crate Structure
//!
//! - [`inventory`], [`capacity`], [`permission`], [`desire`] - value types
//! - [`ledger`] - per-container accounting with two-phase transfers
//! - [`matcher`] - per-tick greedy pairing
//! - [`navigation`] - per-tick path feasibility memo
//! - [`colony`] - containers, carriers and transfer callbacks
//! - [`snapshot`] - persistence

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod capacity;
pub mod colony;
pub mod config;
pub mod desire;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod ledger;
pub mod matcher;
pub mod math;
pub mod navigation;
pub mod permission;
pub mod promise;
pub mod resource;
pub mod snapshot;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::capacity::CapacityPolicy;
    pub use crate::colony::{
        Carrier, CarrierSpec, Colony, ColonyEvent, Container, ContainerKind, ContainerSpec,
        LogisticsProfile,
    };
    pub use crate::config::{MatcherConfig, OrderingPolicy};
    pub use crate::desire::{Desire, DesireState};
    pub use crate::error::{ColonyError, LedgerError, Result};
    pub use crate::ids::{CarrierId, ContainerId, PromiseId};
    pub use crate::inventory::Inventory;
    pub use crate::ledger::{Disposition, InventoryLedger, LedgerChange, Transaction};
    pub use crate::matcher::{Assignment, LogisticsMatcher, MatchReport};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::navigation::{FeasibilityCache, PathOracle};
    pub use crate::permission::{PermissionPolicy, Role};
    pub use crate::promise::{PairStage, PromisePair};
    pub use crate::resource::ResourceType;
    pub use crate::snapshot::{ColonySnapshot, LedgerSnapshot};
}
