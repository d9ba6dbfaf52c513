//! Per-tick logistics matching.
//!
//! Each tick the [`LogisticsMatcher`] classifies every container resource as
//! receiving or distributing, orders both worklists, and greedily pairs the
//! head receive entry with the first distributing container that an idle
//! carrier can reach. Every pairing locks stock at the source and space at
//! the target before the carrier gets its [`PromisePair`].
//!
//! Matching is a pure function of colony state, configuration and oracle
//! answers: identical inputs produce identical assignments.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::colony::{Colony, ContainerKind};
use crate::config::{MatcherConfig, OrderKey};
use crate::desire::DesireState;
use crate::ids::{CarrierId, ContainerId, PromiseId};
use crate::math::Vec2Fixed;
use crate::navigation::{CacheStats, FeasibilityCache, PathOracle};
use crate::permission::Role;
use crate::promise::PromisePair;
use crate::resource::ResourceType;

/// One worklist entry: a container resource with a deficit or surplus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    /// The container.
    pub container: ContainerId,
    /// The resource.
    pub resource: ResourceType,
    /// Units still to be matched this tick.
    pub remaining: u32,
    /// Where the container is.
    pub location: Vec2Fixed,
    /// Ordering key; smaller is served first.
    pub key: OrderKey,
}

/// A pairing made during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// The carrier that received the pair.
    pub carrier: CarrierId,
    /// Distributing container.
    pub source: ContainerId,
    /// Receiving container.
    pub target: ContainerId,
    /// The resource moved.
    pub resource: ResourceType,
    /// Units moved.
    pub quantity: u32,
    /// Pickup promise id.
    pub pickup: PromiseId,
    /// Dropoff promise id.
    pub dropoff: PromiseId,
}

impl Assignment {
    fn from_pair(carrier: CarrierId, pair: &PromisePair) -> Self {
        Self {
            carrier,
            source: pair.pickup.ledger,
            target: pair.dropoff.ledger,
            resource: pair.resource,
            quantity: pair.quantity(),
            pickup: pair.pickup.id,
            dropoff: pair.dropoff.id,
        }
    }
}

/// Outcome of one matching tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// The colony tick matched.
    pub tick: u64,
    /// Receive entries found at classification.
    pub receive_entries: usize,
    /// Distribute entries found at classification.
    pub distribute_entries: usize,
    /// Idle carriers at the start of the tick.
    pub idle_carriers: usize,
    /// Pairings made, in order.
    pub assignments: Vec<Assignment>,
    /// Receive entries no reachable source and carrier could serve.
    pub skipped: Vec<(ContainerId, ResourceType)>,
    /// Receive units left unmatched.
    pub pending_receive: u64,
    /// Distribute units left unmatched.
    pub pending_distribute: u64,
    /// Feasibility cache counters for the tick.
    pub cache: CacheStats,
}

impl MatchReport {
    /// Total units locked for transfer this tick.
    #[must_use]
    pub fn units_assigned(&self) -> u64 {
        self.assignments.iter().map(|a| u64::from(a.quantity)).sum()
    }
}

/// Source and carrier chosen for a receive entry.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distribute_index: usize,
    carrier: CarrierId,
    quantity: u32,
}

/// Pairs receiving and distributing containers once per tick.
#[derive(Debug, Clone, Default)]
pub struct LogisticsMatcher {
    config: MatcherConfig,
    cache: FeasibilityCache,
}

impl LogisticsMatcher {
    /// Create a matcher with the given configuration.
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            cache: FeasibilityCache::new(),
        }
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Replace the configuration; takes effect next tick.
    pub fn set_config(&mut self, config: MatcherConfig) {
        self.config = config;
    }

    /// The feasibility cache as left by the last tick.
    #[must_use]
    pub const fn cache(&self) -> &FeasibilityCache {
        &self.cache
    }

    /// Build the ordered Receive and Distribute worklists for `colony`.
    ///
    /// Carriers' own inventories never take part. Receive quantities are
    /// clamped to the space the receiver can still accept.
    #[must_use]
    pub fn classify(&self, colony: &Colony) -> (Vec<WorkItem>, Vec<WorkItem>) {
        let mut receive = Vec::new();
        let mut distribute = Vec::new();

        for container in colony.containers() {
            if container.kind == ContainerKind::Carrier {
                continue;
            }
            let ledger = container.ledger();
            let desire = ledger.desire();
            if !desire.is_active {
                continue;
            }
            let permission = ledger.permission();
            let space = ledger.available_capacity();

            for resource in ResourceType::ALL {
                let key = self.config.ordering.sort_key(
                    container.profile.is_cache,
                    container.profile.priority,
                    container.id,
                    resource,
                );
                let item = |remaining| WorkItem {
                    container: container.id,
                    resource,
                    remaining,
                    location: container.location,
                    key,
                };
                match desire.classify(resource) {
                    DesireState::Receive(n) if permission.can_deposit(Role::Carrier) => {
                        let n = n.min(space.get(resource));
                        if n > 0 {
                            receive.push(item(n));
                        }
                    }
                    DesireState::Distribute(n) if permission.can_withdraw(Role::Carrier) => {
                        distribute.push(item(n));
                    }
                    _ => {}
                }
            }
        }

        receive.sort_by_key(|w| w.key);
        distribute.sort_by_key(|w| w.key);
        (receive, distribute)
    }

    /// Run one matching tick against `colony`.
    pub fn run_tick<O: PathOracle + ?Sized>(&mut self, colony: &mut Colony, oracle: &O) -> MatchReport {
        let tick = colony.tick();
        self.cache.begin_tick(tick);

        let (receive, mut distribute) = self.classify(colony);
        let mut pool = colony.idle_carriers();
        let mut report = MatchReport {
            tick,
            receive_entries: receive.len(),
            distribute_entries: distribute.len(),
            idle_carriers: pool.len(),
            ..MatchReport::default()
        };
        let mut receive: VecDeque<WorkItem> = receive.into();

        while !pool.is_empty() {
            let Some(mut entry) = receive.pop_front() else {
                break;
            };

            let Some(candidate) = self.find_candidate(colony, oracle, &entry, &distribute, &pool)
            else {
                tracing::debug!(
                    tick,
                    target = %entry.container,
                    resource = %entry.resource,
                    remaining = entry.remaining,
                    "No reachable source for receive entry"
                );
                report.skipped.push((entry.container, entry.resource));
                report.pending_receive += u64::from(entry.remaining);
                continue;
            };

            let source = distribute[candidate.distribute_index].container;
            match colony.assign_transfer(
                candidate.carrier,
                source,
                entry.container,
                entry.resource,
                candidate.quantity,
            ) {
                Ok(pair) => {
                    tracing::debug!(
                        tick,
                        carrier = %candidate.carrier,
                        source = %source,
                        target = %entry.container,
                        resource = %entry.resource,
                        quantity = candidate.quantity,
                        "Assigned transfer"
                    );
                    report
                        .assignments
                        .push(Assignment::from_pair(candidate.carrier, &pair));
                    pool.retain(|&c| c != candidate.carrier);

                    let dist = &mut distribute[candidate.distribute_index];
                    dist.remaining -= candidate.quantity;
                    if dist.remaining == 0 {
                        distribute.remove(candidate.distribute_index);
                    }
                    entry.remaining -= candidate.quantity;
                    if entry.remaining > 0 {
                        receive.push_front(entry);
                    }
                }
                Err(err) => {
                    tracing::debug!(
                        tick,
                        target = %entry.container,
                        resource = %entry.resource,
                        error = %err,
                        "Transfer refused; entry skipped this tick"
                    );
                    report.skipped.push((entry.container, entry.resource));
                    report.pending_receive += u64::from(entry.remaining);
                }
            }
        }

        report.pending_receive += receive.iter().map(|w| u64::from(w.remaining)).sum::<u64>();
        report.pending_distribute = distribute.iter().map(|w| u64::from(w.remaining)).sum();
        report.cache = self.cache.stats();

        tracing::debug!(
            tick,
            assignments = report.assignments.len(),
            skipped = report.skipped.len(),
            pending_receive = report.pending_receive,
            pending_distribute = report.pending_distribute,
            cache_hits = report.cache.hits,
            cache_misses = report.cache.misses,
            "Matching tick complete"
        );

        #[cfg(feature = "debug-validation")]
        if let Err(err) = colony.audit() {
            tracing::error!(tick, error = %err, "Colony audit failed after matching");
        }

        report
    }

    /// First distribute entry, in worklist order, with a reachable idle
    /// carrier for `entry`.
    fn find_candidate<O: PathOracle + ?Sized>(
        &mut self,
        colony: &Colony,
        oracle: &O,
        entry: &WorkItem,
        distribute: &[WorkItem],
        pool: &[CarrierId],
    ) -> Option<Candidate> {
        let target = (entry.container, entry.location);
        let space = colony
            .ledger(entry.container)
            .ok()?
            .available_capacity()
            .get(entry.resource);
        let wanted = entry.remaining.min(space);
        if wanted == 0 {
            return None;
        }

        for (index, dist) in distribute.iter().enumerate() {
            if dist.resource != entry.resource || dist.container == entry.container {
                continue;
            }
            let source = (dist.container, dist.location);

            for (carrier, carrier_node) in self.nearest_carriers(colony, pool, dist.location) {
                let carrier_space = colony
                    .ledger(carrier_node.0)
                    .map(|l| l.available_capacity().get(entry.resource))
                    .unwrap_or(0);
                if carrier_space == 0 {
                    continue;
                }
                if !self.cache.is_navigable(carrier_node, source, oracle)
                    || !self.cache.is_navigable(carrier_node, target, oracle)
                {
                    continue;
                }

                let mut quantity = wanted.min(dist.remaining).min(carrier_space);
                if let Some(max_batch) = self.config.max_batch {
                    quantity = quantity.min(max_batch.max(1));
                }
                return Some(Candidate {
                    distribute_index: index,
                    carrier,
                    quantity,
                });
            }
        }
        None
    }

    /// Idle carriers by squared distance to `location`, ties on id.
    fn nearest_carriers(
        &self,
        colony: &Colony,
        pool: &[CarrierId],
        location: Vec2Fixed,
    ) -> Vec<(CarrierId, (ContainerId, Vec2Fixed))> {
        let mut carriers: Vec<_> = pool
            .iter()
            .filter_map(|&id| {
                let carrier = colony.carrier(id).ok()?;
                let position = colony.container(carrier.container).ok()?.location;
                Some((id, (carrier.container, position)))
            })
            .collect();
        carriers.sort_by_key(|(id, (_, position))| (position.distance_squared(location), *id));
        if let Some(limit) = self.config.carrier_search_limit {
            carriers.truncate(limit);
        }
        carriers
    }
}
