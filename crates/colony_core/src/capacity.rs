//! Capacity policies.
//!
//! A [`CapacityPolicy`] answers how much more a container can take given
//! what already occupies it. "Occupied" is always the caller's choice; the
//! ledger passes `held + reserved_capacity` so inbound reservations count
//! against the limit before the goods arrive.

use serde::{Deserialize, Serialize};

use crate::inventory::Inventory;
use crate::resource::ResourceType;

/// Maximum holdable quantities of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CapacityPolicy {
    /// Zero capacity for everything.
    #[default]
    None,
    /// No limit at all.
    Unlimited,
    /// The summed [`ResourceType::weight`] of the contents is bounded.
    TotalWeight(u32),
    /// Each resource type has its own ceiling.
    PerType(Inventory),
}

impl CapacityPolicy {
    /// Per-type ceiling built from `(resource, max)` pairs.
    #[must_use]
    pub fn per_type(pairs: &[(ResourceType, u32)]) -> Self {
        Self::PerType(Inventory::from_pairs(pairs))
    }

    /// Units of each resource that would still fit on top of `occupied`.
    ///
    /// Each entry is computed independently: for weight-bounded capacity the
    /// entries are alternatives, not a combined allowance. Use
    /// [`CapacityPolicy::clamp`] to fit a mixed request.
    #[must_use]
    pub fn capacity_remaining(&self, occupied: &Inventory) -> Inventory {
        match self {
            Self::None => Inventory::EMPTY,
            Self::Unlimited => Inventory::SATURATED,
            Self::TotalWeight(max) => {
                let budget = u64::from(*max).saturating_sub(occupied.weight());
                ResourceType::ALL
                    .iter()
                    .map(|&resource| {
                        let units = budget / u64::from(resource.weight());
                        (resource, u32::try_from(units).unwrap_or(u32::MAX))
                    })
                    .collect()
            }
            Self::PerType(ceiling) => *ceiling - *occupied,
        }
    }

    /// Units of a single resource that would still fit on top of `occupied`.
    #[must_use]
    pub fn remaining_for(&self, occupied: &Inventory, resource: ResourceType) -> u32 {
        self.capacity_remaining(occupied).get(resource)
    }

    /// Split `request` into the part that fits on top of `occupied` and the
    /// overflow.
    ///
    /// Weight-bounded capacity accepts greedily in canonical resource order,
    /// so the split is deterministic.
    #[must_use]
    pub fn clamp(&self, occupied: &Inventory, request: &Inventory) -> (Inventory, Inventory) {
        let accepted = match self {
            Self::TotalWeight(max) => {
                let mut budget = u64::from(*max).saturating_sub(occupied.weight());
                let mut accepted = Inventory::EMPTY;
                for (resource, wanted) in request.iter() {
                    let weight = u64::from(resource.weight());
                    let fits = (budget / weight).min(u64::from(wanted));
                    budget -= fits * weight;
                    // fits <= wanted, so the conversion cannot fail
                    accepted = accepted.with(resource, u32::try_from(fits).unwrap_or(wanted));
                }
                accepted
            }
            _ => request.intersection(&self.capacity_remaining(occupied)),
        };
        (accepted, *request - accepted)
    }

    /// True if `occupied` is within this policy.
    #[must_use]
    pub fn fits(&self, occupied: &Inventory) -> bool {
        match self {
            Self::None => occupied.is_empty(),
            Self::Unlimited => true,
            Self::TotalWeight(max) => occupied.weight() <= u64::from(*max),
            Self::PerType(ceiling) => ceiling.contains(occupied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceType::*;

    #[test]
    fn test_none_accepts_nothing() {
        let (accepted, overflow) =
            CapacityPolicy::None.clamp(&Inventory::EMPTY, &Inventory::single(Wood, 3));
        assert!(accepted.is_empty());
        assert_eq!(overflow, Inventory::single(Wood, 3));
        assert!(CapacityPolicy::None.fits(&Inventory::EMPTY));
        assert!(!CapacityPolicy::None.fits(&Inventory::single(Food, 1)));
    }

    #[test]
    fn test_unlimited_accepts_everything() {
        let request = Inventory::from_pairs(&[(Stone, 1000), (Tools, 7)]);
        let (accepted, overflow) = CapacityPolicy::Unlimited.clamp(&request, &request);
        assert_eq!(accepted, request);
        assert!(overflow.is_empty());
    }

    #[test]
    fn test_per_type_ceiling() {
        let policy = CapacityPolicy::per_type(&[(Stone, 3)]);
        let (accepted, overflow) =
            policy.clamp(&Inventory::EMPTY, &Inventory::single(Stone, 5));
        assert_eq!(accepted, Inventory::single(Stone, 3));
        assert_eq!(overflow, Inventory::single(Stone, 2));

        // Types without a ceiling have zero capacity
        assert_eq!(policy.remaining_for(&Inventory::EMPTY, Wood), 0);
    }

    #[test]
    fn test_total_weight_is_greedy_in_canonical_order() {
        // Wood weighs 2, Stone weighs 3
        let policy = CapacityPolicy::TotalWeight(10);
        let request = Inventory::from_pairs(&[(Wood, 3), (Stone, 3)]);
        let (accepted, overflow) = policy.clamp(&Inventory::EMPTY, &request);

        assert_eq!(accepted, Inventory::from_pairs(&[(Wood, 3), (Stone, 1)]));
        assert_eq!(overflow, Inventory::single(Stone, 2));
        assert!(policy.fits(&accepted));
    }

    #[test]
    fn test_total_weight_remaining_accounts_for_occupied() {
        let policy = CapacityPolicy::TotalWeight(12);
        let occupied = Inventory::single(Metal, 2); // weight 8

        assert_eq!(policy.remaining_for(&occupied, Food), 4);
        assert_eq!(policy.remaining_for(&occupied, Metal), 1);
        assert_eq!(policy.remaining_for(&occupied, Stone), 1);
    }

    #[test]
    fn test_ron_config_format() {
        let policy: CapacityPolicy = ron::from_str("PerType({Wood: 10})").unwrap();
        assert_eq!(policy, CapacityPolicy::per_type(&[(Wood, 10)]));

        let policy: CapacityPolicy = ron::from_str("TotalWeight(40)").unwrap();
        assert_eq!(policy, CapacityPolicy::TotalWeight(40));
    }
}
