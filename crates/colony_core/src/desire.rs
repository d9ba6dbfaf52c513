//! Target stock compositions and their derived deltas.
//!
//! A container declares the stock it wants to reach. The ledger recomputes
//! the delivery and distribution deltas after every change, and the
//! matcher classifies each resource as [`DesireState::Receive`] or
//! [`DesireState::Distribute`] from those deltas alone.

use serde::{Deserialize, Serialize};

use crate::inventory::Inventory;
use crate::resource::ResourceType;

/// Classification of one resource of one container for a matching tick.
///
/// Transitions are a pure function of current stock versus target, so
/// classifying the same state twice yields the same answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DesireState {
    /// Not yet classified this tick.
    #[default]
    Unknown,
    /// Neither deficit nor surplus.
    None,
    /// The container is short this many units.
    Receive(u32),
    /// The container has this many surplus units to give away.
    Distribute(u32),
}

/// A container's declared target composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Desire {
    /// The stock the container wants to hold.
    pub target: Inventory,
    /// Portion of `target` neither held nor already incoming.
    pub delivery_delta: Inventory,
    /// Available stock in excess of `target`.
    pub distribution_delta: Inventory,
    /// Inactive desires never take part in matching.
    pub is_active: bool,
}

impl Desire {
    /// A desire that never participates in matching.
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            target: Inventory::EMPTY,
            delivery_delta: Inventory::EMPTY,
            distribution_delta: Inventory::EMPTY,
            is_active: false,
        }
    }

    /// An active desire for `target`. Deltas are filled in by the ledger.
    #[must_use]
    pub const fn new(target: Inventory) -> Self {
        Self {
            target,
            delivery_delta: Inventory::EMPTY,
            distribution_delta: Inventory::EMPTY,
            is_active: true,
        }
    }

    /// An active desire to hold nothing: everything available is surplus.
    #[must_use]
    pub const fn shed_all() -> Self {
        Self::new(Inventory::EMPTY)
    }

    /// Recompute the deltas for the given ledger state.
    ///
    /// `incoming` is the reserved capacity: goods already promised in.
    #[must_use]
    pub fn recompute(&self, held: &Inventory, available: &Inventory, incoming: &Inventory) -> Self {
        Self {
            target: self.target,
            delivery_delta: self.target - (*held + *incoming),
            distribution_delta: *available - self.target,
            is_active: self.is_active,
        }
    }

    /// Classify one resource.
    #[must_use]
    pub fn classify(&self, resource: ResourceType) -> DesireState {
        if !self.is_active {
            return DesireState::None;
        }
        let deficit = self.delivery_delta.get(resource);
        let surplus = self.distribution_delta.get(resource);
        if deficit > 0 {
            DesireState::Receive(deficit)
        } else if surplus > 0 {
            DesireState::Distribute(surplus)
        } else {
            DesireState::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceType::*;

    #[test]
    fn test_deficit_counts_incoming() {
        let desire = Desire::new(Inventory::single(Wood, 10));
        let held = Inventory::single(Wood, 3);
        let incoming = Inventory::single(Wood, 4);
        let desire = desire.recompute(&held, &held, &incoming);

        assert_eq!(desire.delivery_delta, Inventory::single(Wood, 3));
        assert_eq!(desire.classify(Wood), DesireState::Receive(3));
        assert_eq!(desire.classify(Stone), DesireState::None);
    }

    #[test]
    fn test_surplus_excludes_forbidden() {
        let desire = Desire::new(Inventory::single(Stone, 2));
        let held = Inventory::single(Stone, 10);
        let available = Inventory::single(Stone, 6); // 4 forbidden
        let desire = desire.recompute(&held, &available, &Inventory::EMPTY);

        assert_eq!(desire.classify(Stone), DesireState::Distribute(4));
    }

    #[test]
    fn test_shed_all_distributes_everything() {
        let held = Inventory::from_pairs(&[(Food, 5), (Cloth, 1)]);
        let desire = Desire::shed_all().recompute(&held, &held, &Inventory::EMPTY);

        assert_eq!(desire.classify(Food), DesireState::Distribute(5));
        assert_eq!(desire.classify(Cloth), DesireState::Distribute(1));
    }

    #[test]
    fn test_inactive_never_classifies() {
        let held = Inventory::single(Food, 5);
        let desire = Desire::inactive().recompute(&held, &held, &Inventory::EMPTY);
        assert_eq!(desire.classify(Food), DesireState::None);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let held = Inventory::single(Metal, 1);
        let desire = Desire::new(Inventory::single(Metal, 3));
        let once = desire.recompute(&held, &held, &Inventory::EMPTY);
        let twice = once.recompute(&held, &held, &Inventory::EMPTY);
        assert_eq!(once, twice);
        assert_eq!(twice.classify(Metal), DesireState::Receive(2));
    }
}
