//! Matcher configuration.
//!
//! Designed to be deserialized from RON so headless scenarios and tools can
//! tune matching without code changes. Every field has a default.
//!
//! # Example RON
//!
//! ```ron
//! MatcherConfig(
//!     ordering: CacheThenPriority,
//!     max_batch: Some(20),
//!     carrier_search_limit: None,
//! )
//! ```

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::error::{ColonyError, Result};
use crate::ids::ContainerId;
use crate::resource::ResourceType;

/// How Receive and Distribute worklists are ordered.
///
/// Every policy falls back to container id, then canonical resource order,
/// so ordering is total and matching is reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderingPolicy {
    /// Non-cache containers first, then higher priority first.
    #[default]
    CacheThenPriority,
    /// Higher priority first; cache status ignored.
    PriorityOnly,
    /// Non-cache containers first; priority ignored.
    CacheOnly,
}

/// Sort key produced by [`OrderingPolicy::sort_key`].
pub type OrderKey = (bool, Reverse<i32>, ContainerId, usize);

impl OrderingPolicy {
    /// Sort key for a worklist entry. Smaller keys are served first.
    #[must_use]
    pub fn sort_key(
        self,
        is_cache: bool,
        priority: i32,
        container: ContainerId,
        resource: ResourceType,
    ) -> OrderKey {
        match self {
            Self::CacheThenPriority => (is_cache, Reverse(priority), container, resource.index()),
            Self::PriorityOnly => (false, Reverse(priority), container, resource.index()),
            Self::CacheOnly => (is_cache, Reverse(0), container, resource.index()),
        }
    }
}

/// Tuning knobs for [`LogisticsMatcher`](crate::matcher::LogisticsMatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Worklist ordering.
    pub ordering: OrderingPolicy,
    /// Upper bound on units moved by a single promise pair.
    pub max_batch: Option<u32>,
    /// Only the N nearest idle carriers are probed per candidate source.
    pub carrier_search_limit: Option<usize>,
}

impl MatcherConfig {
    /// Parse a configuration from RON.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| ColonyError::ConfigParse(e.to_string()))
    }

    /// Set the worklist ordering.
    #[must_use]
    pub const fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    /// Cap the batch size of each promise pair.
    #[must_use]
    pub const fn with_max_batch(mut self, max_batch: u32) -> Self {
        self.max_batch = Some(max_batch);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_ron() {
        let config = MatcherConfig::from_ron_str("()").unwrap();
        assert_eq!(config, MatcherConfig::default());
        assert_eq!(config.ordering, OrderingPolicy::CacheThenPriority);
    }

    #[test]
    fn test_partial_ron() {
        let config = MatcherConfig::from_ron_str("(ordering: PriorityOnly, max_batch: Some(5))")
            .unwrap();
        assert_eq!(config.ordering, OrderingPolicy::PriorityOnly);
        assert_eq!(config.max_batch, Some(5));
        assert_eq!(config.carrier_search_limit, None);
    }

    #[test]
    fn test_bad_ron_is_reported() {
        let err = MatcherConfig::from_ron_str("(ordering: Sideways)").unwrap_err();
        assert!(matches!(err, ColonyError::ConfigParse(_)));
    }

    #[test]
    fn test_cache_then_priority_ordering() {
        let policy = OrderingPolicy::CacheThenPriority;
        let wood = ResourceType::Wood;
        let direct_low = policy.sort_key(false, 1, ContainerId(9), wood);
        let direct_high = policy.sort_key(false, 5, ContainerId(10), wood);
        let cache_high = policy.sort_key(true, 100, ContainerId(1), wood);

        assert!(direct_high < direct_low);
        assert!(direct_low < cache_high);
    }

    #[test]
    fn test_priority_only_ignores_cache() {
        let policy = OrderingPolicy::PriorityOnly;
        let wood = ResourceType::Wood;
        assert!(
            policy.sort_key(true, 5, ContainerId(2), wood)
                < policy.sort_key(false, 1, ContainerId(1), wood)
        );
    }
}
