//! Error types for the logistics core.
//!
//! Two layers, mirroring who can misuse what:
//! - [`LedgerError`]: a single ledger refused a mutation.
//! - [`ColonyError`]: the colony glue refused a callback or lookup.
//!
//! Expected shortfalls (overflow from `add`/`remove`, unmatched demand,
//! unreachable containers) are not errors; they are ordinary return values.

use thiserror::Error;

use crate::ids::{CarrierId, ContainerId};
use crate::inventory::Inventory;

/// Result type alias using [`ColonyError`].
pub type Result<T> = std::result::Result<T, ColonyError>;

/// A ledger refused a mutation. The ledger is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Tried to lock or distribute more than is available.
    #[error("Insufficient stock: requested {requested}, missing {missing}")]
    InsufficientStock {
        /// The requested amount.
        requested: Inventory,
        /// The part of the request not covered by available stock.
        missing: Inventory,
    },

    /// Tried to reserve or deliver more than the remaining capacity.
    #[error("Capacity exceeded: requested {requested}, overflow {overflow}")]
    CapacityExceeded {
        /// The requested amount.
        requested: Inventory,
        /// The part of the request that does not fit.
        overflow: Inventory,
    },

    /// Tried to release or complete a forbidden lock that is not held.
    #[error("Items not forbidden: requested {requested}, missing {missing}")]
    NotForbidden {
        /// The requested amount.
        requested: Inventory,
        /// The part of the request not covered by the forbidden lock.
        missing: Inventory,
    },

    /// Tried to release or complete a reservation that is not held.
    #[error("Capacity not reserved: requested {requested}, missing {missing}")]
    NotReserved {
        /// The requested amount.
        requested: Inventory,
        /// The part of the request not covered by the reservation.
        missing: Inventory,
    },

    /// A bookkeeping invariant does not hold.
    #[error("Ledger invariant violated: {0}")]
    InvariantViolated(String),
}

impl LedgerError {
    /// True for the recoverable shortfall of a delivery request that does
    /// not fit; every other variant signals a caller bypassing the
    /// transaction API.
    #[must_use]
    pub const fn is_expected_shortfall(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

/// Top-level error type for colony operations.
#[derive(Debug, Error)]
pub enum ColonyError {
    /// No container with this id exists.
    #[error("Unknown container: {0}")]
    UnknownContainer(ContainerId),

    /// No carrier with this id exists.
    #[error("Unknown carrier: {0}")]
    UnknownCarrier(CarrierId),

    /// The carrier already holds a promise pair.
    #[error("Carrier {0} already has an active promise")]
    CarrierBusy(CarrierId),

    /// The carrier has no promise to complete or fail.
    #[error("Carrier {0} has no active promise")]
    NoActivePromise(CarrierId),

    /// Dropoff reported before pickup.
    #[error("Carrier {0} has not completed its pickup yet")]
    PickupPending(CarrierId),

    /// Pickup reported twice.
    #[error("Carrier {0} already completed its pickup")]
    PickupAlreadyDone(CarrierId),

    /// A ledger refused the mutation.
    #[error("Ledger of {container} refused: {source}")]
    Ledger {
        /// The container whose ledger refused.
        container: ContainerId,
        /// The ledger's error.
        #[source]
        source: LedgerError,
    },

    /// A forbidden or reserved lock is not backed by any outstanding promise.
    #[error("Leaked lock on {container}: forbidden {forbidden}, reserved {reserved}")]
    LeakedLock {
        /// The container holding the orphaned lock.
        container: ContainerId,
        /// Forbidden units without a pending pickup.
        forbidden: Inventory,
        /// Reserved units without a pending dropoff.
        reserved: Inventory,
    },

    /// Snapshot encoding or decoding failed.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Configuration could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),
}

impl ColonyError {
    /// Wrap a ledger error with the container it came from.
    #[must_use]
    pub const fn ledger(container: ContainerId, source: LedgerError) -> Self {
        Self::Ledger { container, source }
    }
}
