//! Resource type definitions.

use serde::{Deserialize, Serialize};

/// A kind of resource that containers hold and carriers move.
///
/// The set is closed: [`Inventory`](crate::inventory::Inventory) stores one
/// counter per variant, indexed by [`ResourceType::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// Felled timber.
    Wood,
    /// Quarried stone blocks.
    Stone,
    /// Edible rations.
    Food,
    /// Smelted metal bars.
    Metal,
    /// Woven cloth.
    Cloth,
    /// Crafted tools.
    Tools,
}

impl ResourceType {
    /// Number of resource types.
    pub const COUNT: usize = 6;

    /// All resource types in their canonical order.
    ///
    /// Every loop that must be deterministic iterates in this order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Wood,
        Self::Stone,
        Self::Food,
        Self::Metal,
        Self::Cloth,
        Self::Tools,
    ];

    /// Slot of this resource in an inventory's counter array.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Wood => 0,
            Self::Stone => 1,
            Self::Food => 2,
            Self::Metal => 3,
            Self::Cloth => 4,
            Self::Tools => 5,
        }
    }

    /// Weight of a single unit, used by weight-bounded capacity.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Wood => 2,
            Self::Stone => 3,
            Self::Food => 1,
            Self::Metal => 4,
            Self::Cloth => 1,
            Self::Tools => 2,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_canonical_order() {
        for (i, resource) in ResourceType::ALL.iter().enumerate() {
            assert_eq!(resource.index(), i);
        }
    }

    #[test]
    fn test_weights_are_positive() {
        assert!(ResourceType::ALL.iter().all(|r| r.weight() > 0));
    }
}
