//! Per-container inventory ledger.
//!
//! The [`InventoryLedger`] is the only place where a container's stock is
//! accounted. It tracks four quantities:
//!
//! - `held`: everything physically present.
//! - `forbidden`: the part of `held` locked for an outbound transfer.
//! - `reserved_capacity`: inbound goods promised but not yet arrived.
//! - `all_capacity`: the [`CapacityPolicy`] bounding `held + reserved_capacity`.
//!
//! Transfers use two-phase transactions. `request_*` locks stock or space
//! and returns a [`Transaction`]; `complete_*` commits it and `cancel_*`
//! rolls it back. Refused mutations leave the ledger untouched and return
//! a [`LedgerError`].
//!
//! # Invariants
//!
//! After every mutation:
//! - `forbidden ⊆ held`
//! - `available + forbidden == held`
//! - `held + reserved_capacity` fits `all_capacity`

use serde::{Deserialize, Serialize};

use crate::capacity::CapacityPolicy;
use crate::desire::Desire;
use crate::error::LedgerError;
use crate::inventory::Inventory;
use crate::permission::PermissionPolicy;

/// Direction of a two-phase transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Inbound: capacity reserved, goods merged into `held` on completion.
    Deliver,
    /// Outbound: stock forbidden, goods removed from `held` on completion.
    Distribute,
}

/// A pending transfer against one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    /// Direction of the transfer.
    pub kind: TransactionKind,
    /// Items locked by the transfer.
    pub items: Inventory,
}

/// What happens to delivered goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Disposition {
    /// Merge the goods into `held`.
    #[default]
    Store,
    /// Release the reservation without storing anything (spoilage, consumed
    /// on arrival).
    Discard,
}

/// Kind of change recorded in a [`LedgerChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Goods added directly.
    Added,
    /// Goods removed directly.
    Removed,
    /// Stock locked for an outbound transfer.
    Forbidden,
    /// Outbound lock released.
    Unforbidden,
    /// Capacity reserved for an inbound transfer.
    Reserved,
    /// Inbound reservation released.
    Unreserved,
    /// Inbound transfer committed.
    Delivered,
    /// Outbound transfer committed.
    Distributed,
    /// Ledger reinitialised.
    Reset,
    /// Desire target or activity changed.
    DesireChanged,
}

/// One successful mutation, drained by the ledger's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerChange {
    /// What happened.
    pub kind: ChangeKind,
    /// The quantity involved.
    pub delta: Inventory,
}

/// Inventory accounting for one container.
#[derive(Debug, Clone, Default)]
pub struct InventoryLedger {
    held: Inventory,
    forbidden: Inventory,
    reserved_capacity: Inventory,
    all_capacity: CapacityPolicy,
    permission: PermissionPolicy,
    desire: Desire,
    revision: u64,
    changes: Vec<LedgerChange>,
}

impl InventoryLedger {
    /// Create an empty ledger with the given policies.
    #[must_use]
    pub fn new(permission: PermissionPolicy, capacity: CapacityPolicy, desire: Desire) -> Self {
        let mut ledger = Self {
            all_capacity: capacity,
            permission,
            desire,
            ..Self::default()
        };
        ledger.recalculate();
        ledger
    }

    /// Reinitialise to empty with new policies.
    ///
    /// `None` keeps the current desire target and activity. Any outstanding
    /// locks are dropped, so callers must first roll back transfers that
    /// touch this ledger.
    pub fn reset(
        &mut self,
        permission: PermissionPolicy,
        capacity: CapacityPolicy,
        desire: Option<Desire>,
    ) {
        self.held = Inventory::EMPTY;
        self.forbidden = Inventory::EMPTY;
        self.reserved_capacity = Inventory::EMPTY;
        self.all_capacity = capacity;
        self.permission = permission;
        if let Some(desire) = desire {
            self.desire = desire;
        }
        self.commit(ChangeKind::Reset, Inventory::EMPTY);
    }

    // ------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------

    /// Everything physically present.
    #[must_use]
    pub const fn held(&self) -> Inventory {
        self.held
    }

    /// Stock locked for outbound transfers.
    #[must_use]
    pub const fn forbidden(&self) -> Inventory {
        self.forbidden
    }

    /// Inbound goods promised but not yet arrived.
    #[must_use]
    pub const fn reserved_capacity(&self) -> Inventory {
        self.reserved_capacity
    }

    /// Held stock not locked by any transfer.
    #[must_use]
    pub fn available(&self) -> Inventory {
        self.held - self.forbidden
    }

    /// Space left after counting held and incoming goods.
    #[must_use]
    pub fn available_capacity(&self) -> Inventory {
        self.all_capacity.capacity_remaining(&self.occupied())
    }

    /// The capacity policy.
    #[must_use]
    pub const fn all_capacity(&self) -> CapacityPolicy {
        self.all_capacity
    }

    /// The permission policy.
    #[must_use]
    pub const fn permission(&self) -> PermissionPolicy {
        self.permission
    }

    /// The current desire, with deltas up to date.
    #[must_use]
    pub const fn desire(&self) -> Desire {
        self.desire
    }

    /// Number of successful mutations since creation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    fn occupied(&self) -> Inventory {
        self.held + self.reserved_capacity
    }

    // ------------------------------------------------------------------
    // Direct mutation (non-transfer reasons)
    // ------------------------------------------------------------------

    /// Add goods, returning the part that did not fit.
    ///
    /// The overflow is never dropped silently: the caller must route it,
    /// typically into a new item pile.
    pub fn add(&mut self, items: Inventory) -> Inventory {
        let (accepted, overflow) = self.all_capacity.clamp(&self.occupied(), &items);
        if !accepted.is_empty() {
            self.held = self.held + accepted;
            self.commit(ChangeKind::Added, accepted);
        }
        overflow
    }

    /// Remove goods, returning the part that was not available.
    ///
    /// Forbidden stock is locked for a transfer and cannot be removed here.
    pub fn remove(&mut self, items: Inventory) -> Inventory {
        let removed = items.intersection(&self.available());
        if !removed.is_empty() {
            self.held = self.held - removed;
            self.commit(ChangeKind::Removed, removed);
        }
        items - removed
    }

    // ------------------------------------------------------------------
    // Locks
    // ------------------------------------------------------------------

    /// Lock available stock for an outbound transfer.
    pub fn add_forbidden(&mut self, items: Inventory) -> Result<(), LedgerError> {
        let missing = items - self.available();
        if !missing.is_empty() {
            return Err(refuse(LedgerError::InsufficientStock {
                requested: items,
                missing,
            }));
        }
        self.forbidden = self.forbidden + items;
        self.commit(ChangeKind::Forbidden, items);
        Ok(())
    }

    /// Release an outbound lock.
    pub fn remove_forbidden(&mut self, items: Inventory) -> Result<(), LedgerError> {
        self.ensure_forbidden(&items)?;
        self.forbidden = self.forbidden - items;
        self.commit(ChangeKind::Unforbidden, items);
        Ok(())
    }

    /// Reserve capacity for an inbound transfer.
    pub fn add_reserved(&mut self, items: Inventory) -> Result<(), LedgerError> {
        let (_, overflow) = self.all_capacity.clamp(&self.occupied(), &items);
        if !overflow.is_empty() {
            return Err(refuse(LedgerError::CapacityExceeded {
                requested: items,
                overflow,
            }));
        }
        self.reserved_capacity = self.reserved_capacity + items;
        self.commit(ChangeKind::Reserved, items);
        Ok(())
    }

    /// Release an inbound reservation.
    pub fn remove_reserved(&mut self, items: Inventory) -> Result<(), LedgerError> {
        self.ensure_reserved(&items)?;
        self.reserved_capacity = self.reserved_capacity - items;
        self.commit(ChangeKind::Unreserved, items);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Two-phase transactions
    // ------------------------------------------------------------------

    /// Reserve space for `items`.
    ///
    /// All of `items` must fit; otherwise nothing is reserved and the error
    /// carries the overflow so the caller can retry with less.
    pub fn request_deliver(&mut self, items: Inventory) -> Result<Transaction, LedgerError> {
        let (_, overflow) = self.all_capacity.clamp(&self.occupied(), &items);
        if !overflow.is_empty() {
            tracing::debug!(requested = %items, overflow = %overflow, "Delivery request does not fit");
            return Err(LedgerError::CapacityExceeded {
                requested: items,
                overflow,
            });
        }
        self.add_reserved(items)?;
        Ok(Transaction {
            kind: TransactionKind::Deliver,
            items,
        })
    }

    /// Commit a delivery: release the reservation and store the goods.
    ///
    /// Returns the stored quantity (empty for [`Disposition::Discard`]).
    pub fn complete_deliver(
        &mut self,
        transaction: &Transaction,
        disposition: Disposition,
    ) -> Result<Inventory, LedgerError> {
        ensure_kind(transaction, TransactionKind::Deliver)?;
        let items = transaction.items;
        self.ensure_reserved(&items)?;
        self.reserved_capacity = self.reserved_capacity - items;
        let stored = match disposition {
            Disposition::Store => items,
            Disposition::Discard => Inventory::EMPTY,
        };
        self.held = self.held + stored;
        self.commit(ChangeKind::Delivered, stored);
        Ok(stored)
    }

    /// Roll back a delivery that will not arrive.
    pub fn cancel_deliver(&mut self, transaction: &Transaction) -> Result<(), LedgerError> {
        ensure_kind(transaction, TransactionKind::Deliver)?;
        self.remove_reserved(transaction.items)
    }

    /// Lock `items` of available stock for pickup.
    pub fn request_distribution(&mut self, items: Inventory) -> Result<Transaction, LedgerError> {
        self.add_forbidden(items)?;
        Ok(Transaction {
            kind: TransactionKind::Distribute,
            items,
        })
    }

    /// Commit a pickup: the locked goods leave the container.
    ///
    /// Returns the goods now in the carrier's hands.
    pub fn complete_distribution(
        &mut self,
        transaction: &Transaction,
    ) -> Result<Inventory, LedgerError> {
        ensure_kind(transaction, TransactionKind::Distribute)?;
        let items = transaction.items;
        self.ensure_forbidden(&items)?;
        self.forbidden = self.forbidden - items;
        self.held = self.held - items;
        self.commit(ChangeKind::Distributed, items);
        Ok(items)
    }

    /// Roll back a pickup that will not happen.
    pub fn cancel_distribution(&mut self, transaction: &Transaction) -> Result<(), LedgerError> {
        ensure_kind(transaction, TransactionKind::Distribute)?;
        self.remove_forbidden(transaction.items)
    }

    // ------------------------------------------------------------------
    // Desire
    // ------------------------------------------------------------------

    /// Replace the desire. Deltas are recomputed immediately.
    pub fn set_desire(&mut self, desire: Desire) {
        self.desire = desire;
        self.commit(ChangeKind::DesireChanged, desire.target);
    }

    /// Replace only the desire target, keeping its activity.
    pub fn set_desire_target(&mut self, target: Inventory) {
        self.desire.target = target;
        self.commit(ChangeKind::DesireChanged, target);
    }

    /// Switch matching on or off for this ledger.
    pub fn set_desire_active(&mut self, active: bool) {
        self.desire.is_active = active;
        self.commit(ChangeKind::DesireChanged, self.desire.target);
    }

    // ------------------------------------------------------------------
    // Notifications and checks
    // ------------------------------------------------------------------

    /// Drain the recorded changes.
    pub fn take_changes(&mut self) -> Vec<LedgerChange> {
        std::mem::take(&mut self.changes)
    }

    /// Verify the bookkeeping invariants.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        if !self.held.contains(&self.forbidden) {
            return Err(LedgerError::InvariantViolated(format!(
                "forbidden {} exceeds held {}",
                self.forbidden, self.held
            )));
        }
        if self.available() + self.forbidden != self.held {
            return Err(LedgerError::InvariantViolated(format!(
                "available {} + forbidden {} != held {}",
                self.available(),
                self.forbidden,
                self.held
            )));
        }
        if !self.all_capacity.fits(&self.occupied()) {
            return Err(LedgerError::InvariantViolated(format!(
                "held {} + reserved {} exceeds {:?}",
                self.held, self.reserved_capacity, self.all_capacity
            )));
        }
        Ok(())
    }

    /// Build a ledger from raw parts, validating the invariants.
    pub(crate) fn from_parts(
        held: Inventory,
        forbidden: Inventory,
        reserved_capacity: Inventory,
        all_capacity: CapacityPolicy,
        permission: PermissionPolicy,
        desire: Desire,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self {
            held,
            forbidden,
            reserved_capacity,
            all_capacity,
            permission,
            desire,
            ..Self::default()
        };
        ledger.recalculate();
        ledger.check_invariants()?;
        Ok(ledger)
    }

    fn ensure_forbidden(&self, items: &Inventory) -> Result<(), LedgerError> {
        let missing = *items - self.forbidden;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(refuse(LedgerError::NotForbidden {
                requested: *items,
                missing,
            }))
        }
    }

    fn ensure_reserved(&self, items: &Inventory) -> Result<(), LedgerError> {
        let missing = *items - self.reserved_capacity;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(refuse(LedgerError::NotReserved {
                requested: *items,
                missing,
            }))
        }
    }

    fn recalculate(&mut self) {
        self.desire = self
            .desire
            .recompute(&self.held, &self.available(), &self.reserved_capacity);
    }

    fn commit(&mut self, kind: ChangeKind, delta: Inventory) {
        self.recalculate();
        self.revision += 1;
        self.changes.push(LedgerChange { kind, delta });
        debug_assert!(
            self.check_invariants().is_ok(),
            "ledger invariant broken after {kind:?}: {:?}",
            self.check_invariants()
        );
    }
}

fn ensure_kind(transaction: &Transaction, expected: TransactionKind) -> Result<(), LedgerError> {
    if transaction.kind == expected {
        Ok(())
    } else {
        Err(refuse(LedgerError::InvariantViolated(format!(
            "expected a {expected:?} transaction, got {:?}",
            transaction.kind
        ))))
    }
}

/// Log a contract violation before handing it back.
fn refuse(err: LedgerError) -> LedgerError {
    tracing::error!(error = %err, "Ledger mutation refused");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desire::DesireState;
    use crate::resource::ResourceType::*;

    fn stockpile(capacity: CapacityPolicy) -> InventoryLedger {
        InventoryLedger::new(PermissionPolicy::all(), capacity, Desire::inactive())
    }

    fn wood(n: u32) -> Inventory {
        Inventory::single(Wood, n)
    }

    #[test]
    fn test_add_returns_overflow() {
        let mut ledger = stockpile(CapacityPolicy::per_type(&[(Stone, 3)]));
        let overflow = ledger.add(Inventory::single(Stone, 5));

        assert_eq!(overflow, Inventory::single(Stone, 2));
        assert_eq!(ledger.held(), Inventory::single(Stone, 3));
        assert!(ledger.check_invariants().is_ok());
    }

    #[test]
    fn test_add_respects_reserved_capacity() {
        let mut ledger = stockpile(CapacityPolicy::per_type(&[(Wood, 10)]));
        ledger.request_deliver(wood(7)).unwrap();

        let overflow = ledger.add(wood(5));
        assert_eq!(overflow, wood(2));
        assert_eq!(ledger.held(), wood(3));
        assert!(ledger.available_capacity().is_empty());
    }

    #[test]
    fn test_remove_reports_missing_as_overflow() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        ledger.add(wood(4));

        let overflow = ledger.remove(Inventory::from_pairs(&[(Wood, 6), (Food, 1)]));
        assert_eq!(overflow, Inventory::from_pairs(&[(Wood, 2), (Food, 1)]));
        assert!(ledger.held().is_empty());
    }

    #[test]
    fn test_remove_cannot_take_forbidden_stock() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        ledger.add(wood(4));
        ledger.request_distribution(wood(3)).unwrap();

        let overflow = ledger.remove(wood(4));
        assert_eq!(overflow, wood(3));
        assert_eq!(ledger.held(), wood(3));
        assert_eq!(ledger.forbidden(), wood(3));
        assert!(ledger.check_invariants().is_ok());
    }

    #[test]
    fn test_forbidden_more_than_available_is_refused() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        ledger.add(wood(2));
        let before = ledger.revision();

        let err = ledger.add_forbidden(wood(3)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                requested: wood(3),
                missing: wood(1)
            }
        );
        assert!(!err.is_expected_shortfall());
        assert_eq!(ledger.revision(), before);
        assert!(ledger.forbidden().is_empty());
    }

    #[test]
    fn test_request_deliver_oversized_mutates_nothing() {
        let mut ledger = stockpile(CapacityPolicy::per_type(&[(Wood, 5)]));
        ledger.add(wood(2));
        let before = ledger.revision();

        let err = ledger.request_deliver(wood(4)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::CapacityExceeded {
                requested: wood(4),
                overflow: wood(1)
            }
        );
        assert!(err.is_expected_shortfall());
        assert_eq!(ledger.revision(), before);
        assert!(ledger.reserved_capacity().is_empty());
        assert_eq!(ledger.available_capacity().get(Wood), 3);
    }

    #[test]
    fn test_deliver_round_trip_matches_add() {
        let mut direct = stockpile(CapacityPolicy::per_type(&[(Wood, 10)]));
        let mut staged = stockpile(CapacityPolicy::per_type(&[(Wood, 10)]));

        direct.add(wood(6));

        let tx = staged.request_deliver(wood(6)).unwrap();
        assert_eq!(staged.reserved_capacity(), wood(6));
        assert_eq!(staged.available_capacity().get(Wood), 4);
        staged.complete_deliver(&tx, Disposition::Store).unwrap();

        assert_eq!(staged.held(), direct.held());
        assert_eq!(staged.available(), direct.available());
        assert_eq!(staged.reserved_capacity(), direct.reserved_capacity());
        assert_eq!(staged.available_capacity(), direct.available_capacity());
    }

    #[test]
    fn test_discarded_delivery_frees_reservation_only() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        let tx = ledger.request_deliver(wood(3)).unwrap();
        let stored = ledger.complete_deliver(&tx, Disposition::Discard).unwrap();

        assert!(stored.is_empty());
        assert!(ledger.held().is_empty());
        assert!(ledger.reserved_capacity().is_empty());
    }

    #[test]
    fn test_complete_deliver_twice_is_refused() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        let tx = ledger.request_deliver(wood(3)).unwrap();
        ledger.complete_deliver(&tx, Disposition::Store).unwrap();

        let err = ledger.complete_deliver(&tx, Disposition::Store).unwrap_err();
        assert!(matches!(err, LedgerError::NotReserved { .. }));
        assert_eq!(ledger.held(), wood(3));
    }

    #[test]
    fn test_distribution_lifecycle() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        ledger.add(wood(4));

        let tx = ledger.request_distribution(wood(4)).unwrap();
        assert_eq!(ledger.forbidden(), wood(4));
        assert!(ledger.available().is_empty());

        let taken = ledger.complete_distribution(&tx).unwrap();
        assert_eq!(taken, wood(4));
        assert!(ledger.held().is_empty());
        assert!(ledger.forbidden().is_empty());
    }

    #[test]
    fn test_cancel_distribution_restores_available() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        ledger.add(wood(4));
        let tx = ledger.request_distribution(wood(2)).unwrap();
        ledger.cancel_distribution(&tx).unwrap();

        assert_eq!(ledger.available(), wood(4));
        assert!(ledger.forbidden().is_empty());
    }

    #[test]
    fn test_transaction_kind_is_checked() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        ledger.add(wood(4));
        let tx = ledger.request_distribution(wood(2)).unwrap();

        let err = ledger.complete_deliver(&tx, Disposition::Store).unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolated(_)));
        assert_eq!(ledger.forbidden(), wood(2));
    }

    #[test]
    fn test_desire_tracks_every_change() {
        let mut ledger = InventoryLedger::new(
            PermissionPolicy::all(),
            CapacityPolicy::per_type(&[(Wood, 10)]),
            Desire::new(wood(10)),
        );
        assert_eq!(ledger.desire().classify(Wood), DesireState::Receive(10));

        ledger.request_deliver(wood(4)).unwrap();
        assert_eq!(ledger.desire().classify(Wood), DesireState::Receive(6));

        ledger.add(wood(6));
        assert_eq!(ledger.desire().classify(Wood), DesireState::None);

        ledger.set_desire_target(wood(2));
        assert_eq!(ledger.desire().classify(Wood), DesireState::Distribute(4));
    }

    #[test]
    fn test_reset_clears_stock_and_keeps_desire() {
        let mut ledger = InventoryLedger::new(
            PermissionPolicy::all(),
            CapacityPolicy::Unlimited,
            Desire::new(wood(5)),
        );
        ledger.add(wood(3));
        ledger.request_distribution(wood(1)).unwrap();

        ledger.reset(PermissionPolicy::none(), CapacityPolicy::TotalWeight(20), None);
        assert!(ledger.held().is_empty());
        assert!(ledger.forbidden().is_empty());
        assert_eq!(ledger.permission(), PermissionPolicy::none());
        assert_eq!(ledger.desire().target, wood(5));
        assert_eq!(ledger.desire().classify(Wood), DesireState::Receive(5));
    }

    #[test]
    fn test_changes_are_recorded_and_drained() {
        let mut ledger = stockpile(CapacityPolicy::Unlimited);
        ledger.add(wood(2));
        ledger.remove(wood(1));
        ledger.remove(Inventory::single(Food, 1)); // nothing removed, no change

        let changes = ledger.take_changes();
        let kinds: Vec<_> = changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Added, ChangeKind::Removed]);
        assert_eq!(changes[1].delta, wood(1));
        assert!(ledger.take_changes().is_empty());
    }

    #[test]
    fn test_weight_capacity_counts_reservations() {
        // Stone weighs 3
        let mut ledger = stockpile(CapacityPolicy::TotalWeight(9));
        ledger.request_deliver(Inventory::single(Stone, 2)).unwrap();

        assert_eq!(ledger.available_capacity().get(Stone), 1);
        assert!(ledger.request_deliver(Inventory::single(Stone, 2)).is_err());
        assert!(ledger.request_deliver(Inventory::single(Stone, 1)).is_ok());
    }
}
