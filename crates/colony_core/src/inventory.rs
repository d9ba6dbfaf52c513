//! Immutable resource multisets.
//!
//! An [`Inventory`] maps every [`ResourceType`] to a non-negative count. It
//! is a `Copy` value: arithmetic never mutates an operand, it produces a new
//! inventory. Subtraction clamps at zero per resource type, so counts can
//! never go negative.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceType;

/// A multiset of resources.
///
/// Serializes as a map of the non-zero entries, e.g. `{Wood: 4, Stone: 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ResourceType, u32>", into = "BTreeMap<ResourceType, u32>")]
pub struct Inventory {
    counts: [u32; ResourceType::COUNT],
}

impl Inventory {
    /// The empty inventory.
    pub const EMPTY: Self = Self {
        counts: [0; ResourceType::COUNT],
    };

    /// An inventory with `u32::MAX` of every resource.
    ///
    /// Used as the remaining capacity of unbounded containers.
    pub const SATURATED: Self = Self {
        counts: [u32::MAX; ResourceType::COUNT],
    };

    /// Create an empty inventory.
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Create an inventory holding `count` of a single resource.
    #[must_use]
    pub fn single(resource: ResourceType, count: u32) -> Self {
        Self::EMPTY.with(resource, count)
    }

    /// Build an inventory from `(resource, count)` pairs.
    ///
    /// Repeated resources are summed.
    #[must_use]
    pub fn from_pairs(pairs: &[(ResourceType, u32)]) -> Self {
        pairs
            .iter()
            .fold(Self::EMPTY, |acc, &(resource, count)| {
                acc + Self::single(resource, count)
            })
    }

    /// Count of one resource.
    #[must_use]
    pub const fn get(&self, resource: ResourceType) -> u32 {
        self.counts[resource.index()]
    }

    /// Copy of this inventory with one resource count replaced.
    #[must_use]
    pub fn with(mut self, resource: ResourceType, count: u32) -> Self {
        self.counts[resource.index()] = count;
        self
    }

    /// True if every count is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Sum of all counts weighted by [`ResourceType::weight`].
    #[must_use]
    pub fn weight(&self) -> u64 {
        self.iter()
            .map(|(resource, count)| u64::from(count) * u64::from(resource.weight()))
            .sum()
    }

    /// Iterate the non-zero entries in canonical resource order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceType, u32)> + '_ {
        ResourceType::ALL
            .iter()
            .map(|&resource| (resource, self.get(resource)))
            .filter(|&(_, count)| count > 0)
    }

    /// Per-type minimum of two inventories.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        self.zip_with(other, u32::min)
    }

    /// Per-type maximum of two inventories.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.zip_with(other, u32::max)
    }

    /// True if `self` holds at least as much of every resource as `other`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.counts
            .iter()
            .zip(other.counts.iter())
            .all(|(a, b)| a >= b)
    }

    /// Subtract, returning `None` if any resource would go below zero.
    #[must_use]
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        if self.contains(other) {
            Some(*self - *other)
        } else {
            None
        }
    }

    fn zip_with(&self, other: &Self, op: impl Fn(u32, u32) -> u32) -> Self {
        let mut counts = [0; ResourceType::COUNT];
        for (i, slot) in counts.iter_mut().enumerate() {
            *slot = op(self.counts[i], other.counts[i]);
        }
        Self { counts }
    }
}

impl std::ops::Add for Inventory {
    type Output = Self;

    /// Per-type sum, saturating at `u32::MAX`.
    fn add(self, rhs: Self) -> Self::Output {
        self.zip_with(&rhs, u32::saturating_add)
    }
}

impl std::ops::Sub for Inventory {
    type Output = Self;

    /// Per-type difference, clamped at zero.
    fn sub(self, rhs: Self) -> Self::Output {
        self.zip_with(&rhs, u32::saturating_sub)
    }
}

impl From<BTreeMap<ResourceType, u32>> for Inventory {
    fn from(map: BTreeMap<ResourceType, u32>) -> Self {
        map.into_iter()
            .fold(Self::EMPTY, |acc, (resource, count)| {
                acc + Self::single(resource, count)
            })
    }
}

impl From<Inventory> for BTreeMap<ResourceType, u32> {
    fn from(inventory: Inventory) -> Self {
        inventory.iter().collect()
    }
}

impl FromIterator<(ResourceType, u32)> for Inventory {
    fn from_iter<I: IntoIterator<Item = (ResourceType, u32)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::EMPTY, |acc, (resource, count)| {
                acc + Self::single(resource, count)
            })
    }
}

impl std::fmt::Display for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (resource, count)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{resource}: {count}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceType::*;

    #[test]
    fn test_arithmetic_clamps_at_zero() {
        let a = Inventory::from_pairs(&[(Wood, 5), (Stone, 2)]);
        let b = Inventory::from_pairs(&[(Wood, 3), (Stone, 4), (Food, 1)]);

        assert_eq!(a + b, Inventory::from_pairs(&[(Wood, 8), (Stone, 6), (Food, 1)]));
        assert_eq!(a - b, Inventory::single(Wood, 2));
        assert_eq!(b - a, Inventory::from_pairs(&[(Stone, 2), (Food, 1)]));
    }

    #[test]
    fn test_operands_are_unchanged() {
        let a = Inventory::single(Metal, 3);
        let b = Inventory::single(Metal, 1);
        let _ = a - b;
        assert_eq!(a.get(Metal), 3);
        assert_eq!(b.get(Metal), 1);
    }

    #[test]
    fn test_intersection_and_union() {
        let a = Inventory::from_pairs(&[(Wood, 5), (Cloth, 1)]);
        let b = Inventory::from_pairs(&[(Wood, 2), (Tools, 3)]);

        assert_eq!(a.intersection(&b), Inventory::single(Wood, 2));
        assert_eq!(
            a.union(&b),
            Inventory::from_pairs(&[(Wood, 5), (Cloth, 1), (Tools, 3)])
        );
    }

    #[test]
    fn test_contains_and_checked_sub() {
        let big = Inventory::from_pairs(&[(Food, 10), (Stone, 1)]);
        let small = Inventory::single(Food, 4);

        assert!(big.contains(&small));
        assert!(!small.contains(&big));
        assert!(big.contains(&Inventory::EMPTY));
        assert_eq!(
            big.checked_sub(&small),
            Some(Inventory::from_pairs(&[(Food, 6), (Stone, 1)]))
        );
        assert_eq!(small.checked_sub(&big), None);
    }

    #[test]
    fn test_addition_saturates() {
        let a = Inventory::single(Wood, u32::MAX);
        assert_eq!((a + Inventory::single(Wood, 1)).get(Wood), u32::MAX);
    }

    #[test]
    fn test_weight_and_total() {
        let inv = Inventory::from_pairs(&[(Wood, 2), (Metal, 1)]);
        assert_eq!(inv.total(), 3);
        assert_eq!(inv.weight(), 2 * 2 + 4);
    }

    #[test]
    fn test_iter_skips_zero_entries_in_order() {
        let inv = Inventory::from_pairs(&[(Tools, 1), (Wood, 3)]);
        let entries: Vec<_> = inv.iter().collect();
        assert_eq!(entries, vec![(Wood, 3), (Tools, 1)]);
    }

    #[test]
    fn test_ron_map_format() {
        let inv: Inventory = ron::from_str("{Wood: 4, Stone: 1}").unwrap();
        assert_eq!(inv, Inventory::from_pairs(&[(Wood, 4), (Stone, 1)]));

        let text = ron::to_string(&inv).unwrap();
        let back: Inventory = ron::from_str(&text).unwrap();
        assert_eq!(back, inv);
    }

    #[test]
    fn test_display() {
        let inv = Inventory::from_pairs(&[(Wood, 4), (Food, 2)]);
        assert_eq!(inv.to_string(), "{Wood: 4, Food: 2}");
        assert_eq!(Inventory::EMPTY.to_string(), "{}");
    }
}
