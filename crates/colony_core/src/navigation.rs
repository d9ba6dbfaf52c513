//! Per-tick navigation feasibility cache.
//!
//! Path reachability is answered by an external [`PathOracle`] and is
//! expensive. During one matching tick the same container pairs come up
//! again and again (every carrier is tested against the same sources and
//! targets), so answers are memoised per unordered pair of container ids.
//! The memo is cleared at the start of every tick because doors, walls and
//! rooms may change between ticks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::ContainerId;
use crate::math::Vec2Fixed;

/// External reachability query.
pub trait PathOracle {
    /// Can an agent walk from `from` to `to`?
    fn is_path_feasible(&self, from: Vec2Fixed, to: Vec2Fixed) -> bool;
}

impl<F> PathOracle for F
where
    F: Fn(Vec2Fixed, Vec2Fixed) -> bool,
{
    fn is_path_feasible(&self, from: Vec2Fixed, to: Vec2Fixed) -> bool {
        self(from, to)
    }
}

/// One memoised answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeasibilityEntry {
    /// Lower container id of the pair.
    pub source: ContainerId,
    /// Higher container id of the pair.
    pub target: ContainerId,
    /// The oracle's answer.
    pub is_navigable: bool,
}

/// Lookup counters for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the memo.
    pub hits: u64,
    /// Lookups that queried the oracle.
    pub misses: u64,
}

/// Memo of oracle answers for the current tick.
#[derive(Debug, Clone, Default)]
pub struct FeasibilityCache {
    tick: u64,
    entries: HashMap<(ContainerId, ContainerId), bool>,
    stats: CacheStats,
}

impl FeasibilityCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything and start memoising for `tick`.
    pub fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
        self.entries.clear();
        self.stats = CacheStats::default();
    }

    /// The tick the current entries belong to.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Is there a path between two containers?
    ///
    /// The oracle is consulted at most once per unordered pair per tick.
    /// A container is always reachable from itself.
    pub fn is_navigable<O: PathOracle + ?Sized>(
        &mut self,
        (a, a_pos): (ContainerId, Vec2Fixed),
        (b, b_pos): (ContainerId, Vec2Fixed),
        oracle: &O,
    ) -> bool {
        if a == b {
            return true;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&known) = self.entries.get(&key) {
            self.stats.hits += 1;
            return known;
        }
        let answer = oracle.is_path_feasible(a_pos, b_pos);
        tracing::trace!(tick = self.tick, from = %a, to = %b, answer, "Navigation probe");
        self.stats.misses += 1;
        self.entries.insert(key, answer);
        answer
    }

    /// Memoised entries, sorted by pair.
    #[must_use]
    pub fn entries(&self) -> Vec<FeasibilityEntry> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(&(source, target), &is_navigable)| FeasibilityEntry {
                source,
                target,
                is_navigable,
            })
            .collect();
        entries.sort_by_key(|e| (e.source, e.target));
        entries
    }

    /// Lookup counters since [`FeasibilityCache::begin_tick`].
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_oracle_called_once_per_unordered_pair() {
        let calls = Cell::new(0);
        let oracle = |_: Vec2Fixed, _: Vec2Fixed| {
            calls.set(calls.get() + 1);
            true
        };
        let a = (ContainerId(1), Vec2Fixed::ZERO);
        let b = (ContainerId(2), Vec2Fixed::from_ints(5, 5));

        let mut cache = FeasibilityCache::new();
        cache.begin_tick(1);
        assert!(cache.is_navigable(a, b, &oracle));
        assert!(cache.is_navigable(b, a, &oracle));
        assert!(cache.is_navigable(a, b, &oracle));

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });
    }

    #[test]
    fn test_begin_tick_clears_answers() {
        let blocked = Cell::new(true);
        let oracle = |_: Vec2Fixed, _: Vec2Fixed| !blocked.get();
        let a = (ContainerId(1), Vec2Fixed::ZERO);
        let b = (ContainerId(2), Vec2Fixed::ZERO);

        let mut cache = FeasibilityCache::new();
        cache.begin_tick(1);
        assert!(!cache.is_navigable(a, b, &oracle));

        // Door opens; the stale answer survives until the next tick
        blocked.set(false);
        assert!(!cache.is_navigable(a, b, &oracle));

        cache.begin_tick(2);
        assert!(cache.is_navigable(a, b, &oracle));
        assert_eq!(cache.tick(), 2);
    }

    #[test]
    fn test_self_pair_skips_oracle() {
        let oracle = |_: Vec2Fixed, _: Vec2Fixed| false;
        let a = (ContainerId(7), Vec2Fixed::ZERO);
        let mut cache = FeasibilityCache::new();
        assert!(cache.is_navigable(a, a, &oracle));
        assert!(cache.entries().is_empty());
    }

    #[test]
    fn test_entries_are_sorted() {
        let oracle = |from: Vec2Fixed, _: Vec2Fixed| from == Vec2Fixed::ZERO;
        let mut cache = FeasibilityCache::new();
        let p = |id| (ContainerId(id), Vec2Fixed::from_ints(id as i32, 0));
        cache.is_navigable(p(3), p(0), &oracle);
        cache.is_navigable(p(2), p(1), &oracle);

        let entries = cache.entries();
        assert_eq!(entries[0].source, ContainerId(0));
        assert_eq!(entries[0].target, ContainerId(3));
        assert!(!entries[0].is_navigable); // probed from (3, 0)
        assert_eq!(entries[1].source, ContainerId(1));
    }
}
