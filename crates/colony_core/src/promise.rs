//! Carrier-held promises.
//!
//! The matcher hands a carrier a [`PromisePair`]: a pickup at the source
//! ledger followed by a dropoff at the target ledger. Each half wraps the
//! [`Transaction`] that locked stock or space on its ledger, so completing
//! or rolling back the pair never needs to recompute quantities.

use serde::{Deserialize, Serialize};

use crate::ids::{ContainerId, PromiseId};
use crate::inventory::Inventory;
use crate::ledger::{Transaction, TransactionKind};
use crate::resource::ResourceType;

/// One half of a transfer, bound to a single ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Promise {
    /// Unique id of this promise.
    pub id: PromiseId,
    /// The ledger the transaction was made against.
    pub ledger: ContainerId,
    /// The locking transaction.
    pub transaction: Transaction,
}

impl Promise {
    /// Pickup (`Distribute`) or dropoff (`Deliver`).
    #[must_use]
    pub const fn kind(&self) -> TransactionKind {
        self.transaction.kind
    }

    /// The items promised.
    #[must_use]
    pub const fn items(&self) -> Inventory {
        self.transaction.items
    }
}

/// Where a carrier is within its promise pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PairStage {
    /// On the way to the source.
    #[default]
    AwaitingPickup,
    /// Goods in hand, on the way to the target.
    AwaitingDropoff,
}

/// An ordered pickup + dropoff for one resource batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromisePair {
    /// The resource being moved.
    pub resource: ResourceType,
    /// Pickup at the distributing container.
    pub pickup: Promise,
    /// Dropoff at the receiving container.
    pub dropoff: Promise,
    /// Progress through the pair.
    pub stage: PairStage,
    /// Goods in the carrier's hands, locked on its own ledger until the
    /// dropoff. Empty before pickup.
    pub carried: Inventory,
}

impl PromisePair {
    /// Number of units moved by this pair.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.pickup.transaction.items.get(self.resource)
    }

    /// True if the pair still holds a forbidden or reserved lock at
    /// `container`. A source is released once its pickup completes.
    #[must_use]
    pub fn holds_lock_on(&self, container: ContainerId) -> bool {
        let pickup_pending = self.stage == PairStage::AwaitingPickup;
        (pickup_pending && self.pickup.ledger == container) || self.dropoff.ledger == container
    }

    /// Forbidden units this pair still holds at `container`.
    #[must_use]
    pub fn outstanding_forbidden(&self, container: ContainerId) -> Inventory {
        if self.stage == PairStage::AwaitingPickup && self.pickup.ledger == container {
            self.pickup.items()
        } else {
            Inventory::EMPTY
        }
    }

    /// Reserved units this pair still holds at `container`.
    #[must_use]
    pub fn outstanding_reserved(&self, container: ContainerId) -> Inventory {
        if self.dropoff.ledger == container {
            self.dropoff.items()
        } else {
            Inventory::EMPTY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceType::Wood;

    fn pair() -> PromisePair {
        let items = Inventory::single(Wood, 4);
        PromisePair {
            resource: Wood,
            pickup: Promise {
                id: PromiseId(1),
                ledger: ContainerId(2),
                transaction: Transaction {
                    kind: TransactionKind::Distribute,
                    items,
                },
            },
            dropoff: Promise {
                id: PromiseId(2),
                ledger: ContainerId(1),
                transaction: Transaction {
                    kind: TransactionKind::Deliver,
                    items,
                },
            },
            stage: PairStage::AwaitingPickup,
            carried: Inventory::EMPTY,
        }
    }

    #[test]
    fn test_outstanding_locks_follow_stage() {
        let mut pair = pair();
        assert_eq!(pair.quantity(), 4);
        assert_eq!(pair.outstanding_forbidden(ContainerId(2)), Inventory::single(Wood, 4));
        assert_eq!(pair.outstanding_reserved(ContainerId(1)), Inventory::single(Wood, 4));

        pair.stage = PairStage::AwaitingDropoff;
        assert!(pair.outstanding_forbidden(ContainerId(2)).is_empty());
        assert_eq!(pair.outstanding_reserved(ContainerId(1)), Inventory::single(Wood, 4));
    }

    #[test]
    fn test_holds_lock_on() {
        let mut pair = pair();
        assert!(pair.holds_lock_on(ContainerId(1)));
        assert!(pair.holds_lock_on(ContainerId(2)));
        assert!(!pair.holds_lock_on(ContainerId(3)));

        pair.stage = PairStage::AwaitingDropoff;
        assert!(!pair.holds_lock_on(ContainerId(2)));
        assert!(pair.holds_lock_on(ContainerId(1)));
    }
}
