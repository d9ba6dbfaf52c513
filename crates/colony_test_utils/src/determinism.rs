//! Determinism testing utilities.
//!
//! Provides a harness for verifying that matching produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Matching must be reproducible so that a replayed colony makes the same
//! assignments. Sources of non-determinism include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Containers and carriers are always iterated in sorted id order.
//!
//! - **Floating-point math**: carrier distances use fixed-point
//!   arithmetic via [`colony_core::math::Fixed`].
//!
//! - **Oracle answers**: path oracles must be pure functions of their
//!   inputs within a tick.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use colony_core::colony::Colony;
use colony_core::config::MatcherConfig;
use colony_core::matcher::LogisticsMatcher;
use colony_core::snapshot::ColonySnapshot;

use crate::fixtures::{always_reachable, step_instant};

/// Final state hashes of repeated runs of the same setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Final hash of each run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks simulated per run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Index of the first run that ended in a different state than run 0.
    #[must_use]
    pub fn first_divergent_run(&self) -> Option<usize> {
        let first = self.hashes.first()?;
        self.hashes.iter().position(|h| h != first)
    }

    /// True if every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.first_divergent_run().is_none()
    }

    /// # Panics
    ///
    /// Panics naming the first run that diverged from run 0.
    pub fn assert_deterministic(&self) {
        if let Some(run) = self.first_divergent_run() {
            panic!(
                "Colony is non-deterministic: run {run} of {} ended with hash {:#018x} \
                 after {} ticks, run 0 with {:#018x}",
                self.hashes.len(),
                self.hashes[run],
                self.ticks,
                self.hashes[0]
            );
        }
    }
}

/// Play `setup` forward `ticks` times, `runs` times over, and collect the
/// final hash of each run.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let hashes = (0..runs)
        .map(|_| {
            let mut state = setup();
            (0..ticks).for_each(|_| step(&mut state));
            hash(&state)
        })
        .collect();
    DeterminismResult { hashes, ticks }
}

/// Run a colony twice with instantaneous carriers and compare final hashes.
pub fn verify_colony_determinism<F>(setup_fn: F, config: MatcherConfig, num_ticks: u64) -> bool
where
    F: Fn() -> Colony,
{
    verify_determinism(
        2,
        num_ticks,
        || (setup_fn(), LogisticsMatcher::new(config)),
        |state: &mut (Colony, LogisticsMatcher)| {
            let (colony, matcher) = state;
            step_instant(colony, matcher, &always_reachable);
        },
        |state: &(Colony, LogisticsMatcher)| state.0.state_hash(),
    )
    .is_deterministic()
}

/// Compare two colony runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(tick)` if they diverge at that tick.
pub fn find_first_divergence<F>(setup_fn: F, config: MatcherConfig, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Colony,
{
    let mut a = setup_fn();
    let mut b = setup_fn();
    let mut matcher_a = LogisticsMatcher::new(config);
    let mut matcher_b = LogisticsMatcher::new(config);

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        let report_a = step_instant(&mut a, &mut matcher_a, &always_reachable);
        let report_b = step_instant(&mut b, &mut matcher_b, &always_reachable);

        if report_a != report_b || a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot round trip preserves colony state exactly.
pub fn verify_snapshot_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Colony,
{
    let mut colony = setup_fn();
    let mut matcher = LogisticsMatcher::default();
    for _ in 0..num_ticks {
        step_instant(&mut colony, &mut matcher, &always_reachable);
    }
    // Leave the last tick's pairs in flight so promises are persisted too
    colony.advance_tick();
    matcher.run_tick(&mut colony, &always_reachable);

    let hash_before = colony.state_hash();
    let Ok(bytes) = ColonySnapshot::capture(&colony).to_bytes() else {
        return false;
    };
    let Ok(restored) = ColonySnapshot::from_bytes(&bytes).and_then(|s| s.restore()) else {
        return false;
    };

    hash_before == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for ledger and colony testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use colony_core::capacity::CapacityPolicy;
    use colony_core::desire::Desire;
    use colony_core::inventory::Inventory;
    use colony_core::ledger::{Disposition, InventoryLedger, Transaction};
    use colony_core::permission::PermissionPolicy;
    use colony_core::resource::ResourceType;
    use proptest::prelude::*;

    /// Generate a resource type.
    pub fn arb_resource() -> impl Strategy<Value = ResourceType> {
        (0..ResourceType::COUNT).prop_map(|i| ResourceType::ALL[i])
    }

    /// Generate a small inventory (0-2 resource types, 0-12 units each).
    pub fn arb_inventory() -> impl Strategy<Value = Inventory> {
        proptest::collection::vec((arb_resource(), 0u32..12u32), 0..3)
            .prop_map(|pairs| pairs.into_iter().collect())
    }

    /// Generate a capacity policy.
    pub fn arb_capacity() -> impl Strategy<Value = CapacityPolicy> {
        prop_oneof![
            Just(CapacityPolicy::None),
            Just(CapacityPolicy::Unlimited),
            (0u32..80u32).prop_map(CapacityPolicy::TotalWeight),
            arb_inventory().prop_map(CapacityPolicy::PerType),
        ]
    }

    /// One externally driven ledger operation.
    #[derive(Debug, Clone, Copy)]
    pub enum LedgerOp {
        /// Direct add.
        Add(Inventory),
        /// Direct remove.
        Remove(Inventory),
        /// Start an inbound transfer.
        RequestDeliver(Inventory),
        /// Start an outbound transfer.
        RequestDistribution(Inventory),
        /// Complete the oldest pending delivery.
        CompleteDeliver(Disposition),
        /// Cancel the oldest pending delivery.
        CancelDeliver,
        /// Complete the oldest pending distribution.
        CompleteDistribution,
        /// Cancel the oldest pending distribution.
        CancelDistribution,
        /// Replace the desire target.
        SetDesireTarget(Inventory),
    }

    /// Generate a ledger operation.
    pub fn arb_ledger_op() -> impl Strategy<Value = LedgerOp> {
        prop_oneof![
            arb_inventory().prop_map(LedgerOp::Add),
            arb_inventory().prop_map(LedgerOp::Remove),
            arb_inventory().prop_map(LedgerOp::RequestDeliver),
            arb_inventory().prop_map(LedgerOp::RequestDistribution),
            Just(LedgerOp::CompleteDeliver(Disposition::Store)),
            Just(LedgerOp::CompleteDeliver(Disposition::Discard)),
            Just(LedgerOp::CancelDeliver),
            Just(LedgerOp::CompleteDistribution),
            Just(LedgerOp::CancelDistribution),
            arb_inventory().prop_map(LedgerOp::SetDesireTarget),
        ]
    }

    /// Generate a sequence of ledger operations.
    pub fn arb_ledger_ops(max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
        proptest::collection::vec(arb_ledger_op(), 0..max_len)
    }

    /// A ledger plus the transactions its driver still owes it.
    #[derive(Debug, Clone)]
    pub struct LedgerHarness {
        /// The ledger under test.
        pub ledger: InventoryLedger,
        /// Outstanding deliveries, oldest first.
        pub deliveries: Vec<Transaction>,
        /// Outstanding distributions, oldest first.
        pub distributions: Vec<Transaction>,
    }

    impl LedgerHarness {
        /// Start from an empty ledger with the given capacity.
        #[must_use]
        pub fn new(capacity: CapacityPolicy) -> Self {
            Self {
                ledger: InventoryLedger::new(PermissionPolicy::all(), capacity, Desire::shed_all()),
                deliveries: Vec::new(),
                distributions: Vec::new(),
            }
        }

        /// Apply one operation. Refusals are expected and ignored.
        pub fn apply(&mut self, op: LedgerOp) {
            match op {
                LedgerOp::Add(items) => {
                    let _ = self.ledger.add(items);
                }
                LedgerOp::Remove(items) => {
                    let _ = self.ledger.remove(items);
                }
                LedgerOp::RequestDeliver(items) => {
                    if let Ok(tx) = self.ledger.request_deliver(items) {
                        self.deliveries.push(tx);
                    }
                }
                LedgerOp::RequestDistribution(items) => {
                    if let Ok(tx) = self.ledger.request_distribution(items) {
                        self.distributions.push(tx);
                    }
                }
                LedgerOp::CompleteDeliver(disposition) => {
                    if !self.deliveries.is_empty() {
                        let tx = self.deliveries.remove(0);
                        let _ = self.ledger.complete_deliver(&tx, disposition);
                    }
                }
                LedgerOp::CancelDeliver => {
                    if !self.deliveries.is_empty() {
                        let tx = self.deliveries.remove(0);
                        let _ = self.ledger.cancel_deliver(&tx);
                    }
                }
                LedgerOp::CompleteDistribution => {
                    if !self.distributions.is_empty() {
                        let tx = self.distributions.remove(0);
                        let _ = self.ledger.complete_distribution(&tx);
                    }
                }
                LedgerOp::CancelDistribution => {
                    if !self.distributions.is_empty() {
                        let tx = self.distributions.remove(0);
                        let _ = self.ledger.cancel_distribution(&tx);
                    }
                }
                LedgerOp::SetDesireTarget(target) => self.ledger.set_desire_target(target),
            }
        }

        /// Sum of the outstanding delivery transactions.
        #[must_use]
        pub fn pending_inbound(&self) -> Inventory {
            self.deliveries
                .iter()
                .fold(Inventory::EMPTY, |acc, tx| acc + tx.items)
        }

        /// Sum of the outstanding distribution transactions.
        #[must_use]
        pub fn pending_outbound(&self) -> Inventory {
            self.distributions
                .iter()
                .fold(Inventory::EMPTY, |acc, tx| acc + tx.items)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{pair_colony, village};
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic());
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_first_divergent_run() {
        let result = DeterminismResult {
            hashes: vec![3, 3, 1, 3],
            ticks: 1,
        };
        assert_eq!(result.first_divergent_run(), Some(2));
        assert!(!result.is_deterministic());

        let empty = DeterminismResult {
            hashes: Vec::new(),
            ticks: 0,
        };
        assert!(empty.is_deterministic());
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_assert_deterministic_panics() {
        let runs = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                runs.set(runs.get() + 1);
                runs.get()
            },
            |_| {},
            |n| compute_hash(n),
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_village_is_deterministic() {
        assert!(verify_colony_determinism(|| village(5), MatcherConfig::default(), 30));
        assert_eq!(find_first_divergence(|| village(5), MatcherConfig::default(), 30), None);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        assert!(verify_snapshot_determinism(|| village(3), 5));
        assert!(verify_snapshot_determinism(|| pair_colony(true).colony, 0));
    }

    proptest! {
        #[test]
        fn prop_harness_matches_ledger_locks(
            capacity in arb_capacity(),
            ops in arb_ledger_ops(40),
        ) {
            let mut harness = LedgerHarness::new(capacity);
            for op in ops {
                harness.apply(op);
                prop_assert!(harness.ledger.check_invariants().is_ok());
            }
            prop_assert_eq!(harness.ledger.reserved_capacity(), harness.pending_inbound());
            prop_assert_eq!(harness.ledger.forbidden(), harness.pending_outbound());
        }
    }
}
