//! Reproducibility of matching across runs, orderings and snapshots.

use colony_core::prelude::*;
use colony_test_utils::determinism::{
    find_first_divergence, verify_colony_determinism, verify_snapshot_determinism,
};
use colony_test_utils::fixtures::{always_reachable, pair_colony, village};

#[test]
fn village_runs_are_identical() {
    for ordering in [
        OrderingPolicy::CacheThenPriority,
        OrderingPolicy::PriorityOnly,
        OrderingPolicy::CacheOnly,
    ] {
        let config = MatcherConfig::default().with_ordering(ordering);
        assert!(verify_colony_determinism(|| village(4), config, 40), "{ordering:?}");
    }
}

#[test]
fn reports_agree_tick_by_tick() {
    let config = MatcherConfig {
        max_batch: Some(3),
        carrier_search_limit: Some(2),
        ..MatcherConfig::default()
    };
    assert_eq!(find_first_divergence(|| village(6), config, 60), None);
}

#[test]
fn snapshots_preserve_in_flight_promises() {
    assert!(verify_snapshot_determinism(|| village(4), 3));
    assert!(verify_snapshot_determinism(|| pair_colony(true).colony, 0));
}

#[test]
fn matching_is_independent_of_previous_cache() {
    let mut warm = LogisticsMatcher::default();
    let mut scratch = pair_colony(false).colony;
    warm.run_tick(&mut scratch, &always_reachable);

    let mut a = pair_colony(true).colony;
    let mut b = pair_colony(true).colony;
    let report_warm = warm.run_tick(&mut a, &always_reachable);
    let report_cold = LogisticsMatcher::default().run_tick(&mut b, &always_reachable);

    assert_eq!(report_warm.assignments, report_cold.assignments);
    assert_eq!(a.state_hash(), b.state_hash());
}
