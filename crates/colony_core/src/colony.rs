//! Colony state: containers, carriers, and the transfer callback surface.
//!
//! The [`Colony`] owns every container's [`InventoryLedger`] and every
//! carrier's promise slot. It is the seam between this crate and the
//! external behavior layer:
//!
//! - container-owning code mutates ledgers through [`Colony::ledger_mut`]
//!   (`add`, `remove`, `reset`, desire setters);
//! - the [`LogisticsMatcher`](crate::matcher::LogisticsMatcher) locks stock
//!   and issues promise pairs;
//! - the behavior layer reports progress with [`Colony::complete_pickup`],
//!   [`Colony::complete_dropoff`] and [`Colony::fail_promise`].
//!
//! # Determinism
//!
//! Containers and carriers are stored in `BTreeMap`s keyed by id, so every
//! iteration is in id order and [`Colony::state_hash`] is reproducible.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::capacity::CapacityPolicy;
use crate::desire::Desire;
use crate::error::{ColonyError, LedgerError, Result};
use crate::ids::{CarrierId, ContainerId, PromiseId};
use crate::inventory::Inventory;
use crate::ledger::{Disposition, InventoryLedger, LedgerChange, Transaction, TransactionKind};
use crate::math::Vec2Fixed;
use crate::permission::{PermissionPolicy, Role};
use crate::promise::{PairStage, Promise, PromisePair};
use crate::resource::ResourceType;

/// What sort of entity owns a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContainerKind {
    /// A building: construction site, workshop, house.
    #[default]
    Building,
    /// A storage building.
    Stockpile,
    /// Items lying on the ground.
    Pile,
    /// A carrier's own inventory.
    Carrier,
}

/// Worklist ordering keys of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LogisticsProfile {
    /// Cache-type containers are served after direct ones.
    pub is_cache: bool,
    /// Higher priorities are served first.
    pub priority: i32,
}

/// Parameters for spawning a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Display name.
    pub name: String,
    /// Owning entity kind.
    pub kind: ContainerKind,
    /// World location.
    pub location: Vec2Fixed,
    /// Capacity policy.
    pub capacity: CapacityPolicy,
    /// Permission policy.
    pub permission: PermissionPolicy,
    /// Desire; use [`Desire::inactive`] for containers that never request.
    pub desire: Desire,
    /// Stock present at spawn.
    pub held: Inventory,
    /// Worklist ordering keys.
    pub profile: LogisticsProfile,
}

/// A container in the colony.
#[derive(Debug, Clone)]
pub struct Container {
    /// Unique id.
    pub id: ContainerId,
    /// Display name.
    pub name: String,
    /// Owning entity kind.
    pub kind: ContainerKind,
    /// World location.
    pub location: Vec2Fixed,
    /// Worklist ordering keys.
    pub profile: LogisticsProfile,
    pub(crate) ledger: InventoryLedger,
}

impl Container {
    /// The container's ledger.
    #[must_use]
    pub const fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }
}

/// Parameters for spawning a carrier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarrierSpec {
    /// Display name.
    pub name: String,
    /// World location.
    pub location: Vec2Fixed,
    /// How much the carrier can hold at once.
    pub capacity: CapacityPolicy,
}

/// A mobile agent that moves goods between containers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Carrier {
    /// Unique id.
    pub id: CarrierId,
    /// The carrier's own inventory container.
    pub container: ContainerId,
    pub(crate) active: Option<PromisePair>,
}

impl Carrier {
    /// True while the carrier holds a promise pair.
    #[must_use]
    pub const fn has_active_promise(&self) -> bool {
        self.active.is_some()
    }

    /// The current promise pair, if any.
    #[must_use]
    pub const fn active_promise(&self) -> Option<&PromisePair> {
        self.active.as_ref()
    }

    /// Forbidden units the carrier's pair still holds at `container`,
    /// counting the goods locked in its own inventory.
    #[must_use]
    pub fn outstanding_forbidden(&self, container: ContainerId) -> Inventory {
        self.active.map_or(Inventory::EMPTY, |pair| {
            let in_hand = if container == self.container {
                pair.carried
            } else {
                Inventory::EMPTY
            };
            pair.outstanding_forbidden(container) + in_hand
        })
    }
}

/// Events generated by colony operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColonyEvent {
    /// A ledger mutated.
    LedgerChanged {
        /// The container whose ledger changed.
        container: ContainerId,
        /// The change.
        change: LedgerChange,
    },
    /// A carrier received a promise pair.
    PromiseIssued {
        /// The carrier.
        carrier: CarrierId,
        /// The pair.
        pair: PromisePair,
    },
    /// A carrier picked up its goods.
    PickupCompleted {
        /// The carrier.
        carrier: CarrierId,
        /// The pickup promise.
        promise: PromiseId,
        /// Goods picked up.
        items: Inventory,
    },
    /// A carrier delivered its goods.
    DropoffCompleted {
        /// The carrier.
        carrier: CarrierId,
        /// The dropoff promise.
        promise: PromiseId,
        /// Goods stored at the target.
        stored: Inventory,
    },
    /// A transfer failed and its locks were released.
    PromiseRolledBack {
        /// The carrier.
        carrier: CarrierId,
        /// The abandoned pair.
        pair: PromisePair,
    },
    /// An item pile was spawned to hold overflow.
    PileSpawned {
        /// The new pile.
        container: ContainerId,
        /// Its contents.
        items: Inventory,
    },
    /// A container left the simulation.
    ContainerDespawned {
        /// The removed container.
        container: ContainerId,
        /// Stock it still held.
        held: Inventory,
    },
}

/// All containers and carriers of one colony.
#[derive(Debug, Clone)]
pub struct Colony {
    tick: u64,
    containers: BTreeMap<ContainerId, Container>,
    carriers: BTreeMap<CarrierId, Carrier>,
    next_container: u64,
    next_carrier: u64,
    next_promise: u64,
    events: Vec<ColonyEvent>,
}

impl Default for Colony {
    fn default() -> Self {
        Self::new()
    }
}

impl Colony {
    /// Create an empty colony.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tick: 0,
            containers: BTreeMap::new(),
            carriers: BTreeMap::new(),
            next_container: 1,
            next_carrier: 1,
            next_promise: 1,
            events: Vec::new(),
        }
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance the tick counter, returning the new tick.
    pub fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    // ------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------

    /// Add a container. Initial stock that does not fit is dropped into a
    /// pile next to it.
    pub fn spawn_container(&mut self, spec: ContainerSpec) -> ContainerId {
        let id = ContainerId(self.next_container);
        self.next_container += 1;

        let mut ledger = InventoryLedger::new(spec.permission, spec.capacity, spec.desire);
        let overflow = ledger.add(spec.held);
        let location = spec.location;

        self.containers.insert(
            id,
            Container {
                id,
                name: spec.name,
                kind: spec.kind,
                location,
                profile: spec.profile,
                ledger,
            },
        );

        if !overflow.is_empty() {
            tracing::warn!(container = %id, overflow = %overflow, "Initial stock exceeds capacity");
            self.spawn_pile(location, overflow);
        }
        id
    }

    /// Drop `items` on the ground as a pile that wants to be emptied.
    ///
    /// Returns `None` if there is nothing to drop.
    pub fn spawn_pile(&mut self, location: Vec2Fixed, items: Inventory) -> Option<ContainerId> {
        if items.is_empty() {
            return None;
        }
        let id = self.spawn_container(ContainerSpec {
            name: "item pile".to_string(),
            kind: ContainerKind::Pile,
            location,
            capacity: CapacityPolicy::Unlimited,
            permission: PermissionPolicy::withdraw_only(&[Role::Carrier, Role::Owner]),
            desire: Desire::shed_all(),
            held: items,
            profile: LogisticsProfile::default(),
        });
        self.events.push(ColonyEvent::PileSpawned {
            container: id,
            items,
        });
        Some(id)
    }

    /// Add a carrier together with its own inventory container.
    pub fn spawn_carrier(&mut self, spec: CarrierSpec) -> CarrierId {
        let container = self.spawn_container(ContainerSpec {
            name: spec.name,
            kind: ContainerKind::Carrier,
            location: spec.location,
            capacity: spec.capacity,
            permission: PermissionPolicy::for_roles(&[Role::Carrier], &[Role::Carrier]),
            desire: Desire::inactive(),
            held: Inventory::EMPTY,
            profile: LogisticsProfile::default(),
        });
        let id = CarrierId(self.next_carrier);
        self.next_carrier += 1;
        self.carriers.insert(
            id,
            Carrier {
                id,
                container,
                active: None,
            },
        );
        id
    }

    /// Remove a container from the simulation.
    ///
    /// Every promise still holding a lock on it is rolled back first, so no
    /// lock outlives the container. Carriers that already picked up from it
    /// keep their pair. Returns the stock it still held; the caller decides
    /// whether to drop it as a pile.
    pub fn despawn_container(&mut self, id: ContainerId) -> Result<Inventory> {
        let kind = self.container(id)?.kind;
        if kind == ContainerKind::Carrier {
            if let Some(carrier) = self.carrier_for_container(id) {
                return self.despawn_carrier(carrier);
            }
        }

        let affected: Vec<CarrierId> = self
            .carriers
            .values()
            .filter(|c| c.active.is_some_and(|pair| pair.holds_lock_on(id)))
            .map(|c| c.id)
            .collect();
        for carrier in affected {
            if let Err(err) = self.fail_promise(carrier) {
                tracing::error!(carrier = %carrier, error = %err, "Rollback during despawn failed");
            }
        }

        let container = self
            .containers
            .remove(&id)
            .ok_or(ColonyError::UnknownContainer(id))?;
        let ledger = container.ledger;
        if !ledger.forbidden().is_empty() || !ledger.reserved_capacity().is_empty() {
            tracing::error!(
                container = %id,
                forbidden = %ledger.forbidden(),
                reserved = %ledger.reserved_capacity(),
                "Container despawned with unreleased locks"
            );
        }
        let held = ledger.held();
        self.events.push(ColonyEvent::ContainerDespawned {
            container: id,
            held,
        });
        Ok(held)
    }

    /// Remove a carrier, rolling back its promise pair.
    ///
    /// Goods it was carrying for the pair are dropped as a pile; any other
    /// stock in its inventory is returned to the caller.
    pub fn despawn_carrier(&mut self, id: CarrierId) -> Result<Inventory> {
        let container = self.carrier(id)?.container;
        if self.carrier(id)?.has_active_promise() {
            self.fail_promise(id)?;
        }
        self.carriers.remove(&id);
        let removed = self
            .containers
            .remove(&container)
            .ok_or(ColonyError::UnknownContainer(container))?;
        let held = removed.ledger.held();
        self.events.push(ColonyEvent::ContainerDespawned { container, held });
        Ok(held)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Look up a container.
    pub fn container(&self, id: ContainerId) -> Result<&Container> {
        self.containers
            .get(&id)
            .ok_or(ColonyError::UnknownContainer(id))
    }

    /// All containers in id order.
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    /// A container's ledger.
    pub fn ledger(&self, id: ContainerId) -> Result<&InventoryLedger> {
        self.container(id).map(|c| &c.ledger)
    }

    /// Mutable access to a container's ledger for its owning code.
    ///
    /// Transfers must go through the matcher and the promise callbacks;
    /// locking stock here by hand leaves locks that [`Colony::audit`]
    /// reports as leaked.
    pub fn ledger_mut(&mut self, id: ContainerId) -> Result<&mut InventoryLedger> {
        self.containers
            .get_mut(&id)
            .map(|c| &mut c.ledger)
            .ok_or(ColonyError::UnknownContainer(id))
    }

    /// Add goods to a container, dropping the overflow as a pile.
    pub fn add_to(&mut self, id: ContainerId, items: Inventory) -> Result<Option<ContainerId>> {
        let overflow = self.ledger_mut(id)?.add(items);
        let location = self.container(id)?.location;
        Ok(self.spawn_pile(location, overflow))
    }

    /// Look up a carrier.
    pub fn carrier(&self, id: CarrierId) -> Result<&Carrier> {
        self.carriers.get(&id).ok_or(ColonyError::UnknownCarrier(id))
    }

    /// All carriers in id order.
    pub fn carriers(&self) -> impl Iterator<Item = &Carrier> {
        self.carriers.values()
    }

    /// Carriers without a promise pair, in id order.
    #[must_use]
    pub fn idle_carriers(&self) -> Vec<CarrierId> {
        self.carriers
            .values()
            .filter(|c| !c.has_active_promise())
            .map(|c| c.id)
            .collect()
    }

    /// Current location of a carrier.
    pub fn carrier_location(&self, id: CarrierId) -> Result<Vec2Fixed> {
        let container = self.carrier(id)?.container;
        Ok(self.container(container)?.location)
    }

    /// Move a carrier.
    pub fn move_carrier(&mut self, id: CarrierId, location: Vec2Fixed) -> Result<()> {
        let container = self.carrier(id)?.container;
        self.containers
            .get_mut(&container)
            .ok_or(ColonyError::UnknownContainer(container))?
            .location = location;
        Ok(())
    }

    fn carrier_for_container(&self, container: ContainerId) -> Option<CarrierId> {
        self.carriers
            .values()
            .find(|c| c.container == container)
            .map(|c| c.id)
    }

    fn carrier_mut(&mut self, id: CarrierId) -> Result<&mut Carrier> {
        self.carriers
            .get_mut(&id)
            .ok_or(ColonyError::UnknownCarrier(id))
    }

    // ------------------------------------------------------------------
    // Promise issuance (matcher only)
    // ------------------------------------------------------------------

    /// Lock `quantity` units at both ends and hand the carrier a promise
    /// pair. Either everything succeeds or nothing is locked.
    pub(crate) fn assign_transfer(
        &mut self,
        carrier: CarrierId,
        source: ContainerId,
        target: ContainerId,
        resource: ResourceType,
        quantity: u32,
    ) -> Result<PromisePair> {
        if self.carrier(carrier)?.has_active_promise() {
            return Err(ColonyError::CarrierBusy(carrier));
        }
        let items = Inventory::single(resource, quantity);

        let pickup_tx = self
            .ledger_mut(source)?
            .request_distribution(items)
            .map_err(|e| ColonyError::ledger(source, e))?;

        let dropoff_tx = match self.ledger_mut(target).and_then(|ledger| {
            ledger
                .request_deliver(items)
                .map_err(|e| ColonyError::ledger(target, e))
        }) {
            Ok(tx) => tx,
            Err(err) => {
                self.ledger_mut(source)?
                    .cancel_distribution(&pickup_tx)
                    .map_err(|e| ColonyError::ledger(source, e))?;
                return Err(err);
            }
        };

        let pair = PromisePair {
            resource,
            pickup: Promise {
                id: self.next_promise_id(),
                ledger: source,
                transaction: pickup_tx,
            },
            dropoff: Promise {
                id: self.next_promise_id(),
                ledger: target,
                transaction: dropoff_tx,
            },
            stage: PairStage::AwaitingPickup,
            carried: Inventory::EMPTY,
        };
        self.carrier_mut(carrier)?.active = Some(pair);
        self.events.push(ColonyEvent::PromiseIssued { carrier, pair });
        Ok(pair)
    }

    fn next_promise_id(&mut self) -> PromiseId {
        let id = PromiseId(self.next_promise);
        self.next_promise += 1;
        id
    }

    // ------------------------------------------------------------------
    // Behavior layer callbacks
    // ------------------------------------------------------------------

    /// The carrier reached the source and took the goods.
    ///
    /// The goods are locked on the carrier's own ledger until the dropoff,
    /// so nothing can remove them in transit. Goods the carrier cannot hold
    /// are dropped as a pile and the dropoff shrinks to match. A source pile
    /// left empty is despawned.
    ///
    /// Returns the goods now carried. A refused ledger mutation leaves the
    /// pair untouched; the caller should then [`Colony::fail_promise`].
    pub fn complete_pickup(&mut self, carrier: CarrierId) -> Result<Inventory> {
        let pair = self.active_pair(carrier)?;
        if pair.stage != PairStage::AwaitingPickup {
            return Err(ColonyError::PickupAlreadyDone(carrier));
        }
        let source = pair.pickup.ledger;
        let items = self
            .ledger_mut(source)?
            .complete_distribution(&pair.pickup.transaction)
            .map_err(|e| ColonyError::ledger(source, e))?;

        let own = self.carrier(carrier)?.container;
        let overflow = self.ledger_mut(own)?.add(items);
        if !overflow.is_empty() {
            tracing::warn!(carrier = %carrier, overflow = %overflow, "Carrier cannot hold pickup");
            let location = self.container(own)?.location;
            self.spawn_pile(location, overflow);
        }
        let carried = items - overflow;
        self.ledger_mut(own)?
            .add_forbidden(carried)
            .map_err(|e| ColonyError::ledger(own, e))?;

        if let Some(active) = self.carrier_mut(carrier)?.active.as_mut() {
            active.stage = PairStage::AwaitingDropoff;
            active.carried = carried;
        }
        self.events.push(ColonyEvent::PickupCompleted {
            carrier,
            promise: pair.pickup.id,
            items: carried,
        });
        self.despawn_if_drained_pile(source)?;
        Ok(carried)
    }

    /// Remove a pile that holds nothing and that no promise still locks.
    fn despawn_if_drained_pile(&mut self, id: ContainerId) -> Result<()> {
        let container = self.container(id)?;
        let drained = container.kind == ContainerKind::Pile
            && container.ledger.held().is_empty()
            && container.ledger.reserved_capacity().is_empty();
        let locked = self
            .carriers
            .values()
            .any(|c| c.active.is_some_and(|pair| pair.holds_lock_on(id)));
        if drained && !locked {
            tracing::debug!(container = %id, "Despawning drained pile");
            self.despawn_container(id)?;
        }
        Ok(())
    }

    /// The carrier reached the target and handed the goods over.
    ///
    /// Only the goods actually carried are delivered; reserved space for
    /// anything lost at pickup is released. Returns the quantity stored at
    /// the target.
    pub fn complete_dropoff(
        &mut self,
        carrier: CarrierId,
        disposition: Disposition,
    ) -> Result<Inventory> {
        let pair = self.active_pair(carrier)?;
        if pair.stage != PairStage::AwaitingDropoff {
            return Err(ColonyError::PickupPending(carrier));
        }
        let own = self.carrier(carrier)?.container;
        let target = pair.dropoff.ledger;
        if !self.containers.contains_key(&target) {
            return Err(ColonyError::UnknownContainer(target));
        }

        let handed_over = self
            .ledger_mut(own)?
            .complete_distribution(&carried_transaction(&pair))
            .map_err(|e| ColonyError::ledger(own, e))?;

        let delivery = Transaction {
            kind: TransactionKind::Deliver,
            items: handed_over,
        };
        let shortfall = pair.dropoff.items() - handed_over;
        let ledger = self.ledger_mut(target)?;
        if !shortfall.is_empty() {
            tracing::warn!(carrier = %carrier, shortfall = %shortfall, "Dropoff short of promised goods");
            ledger
                .remove_reserved(shortfall)
                .map_err(|e| ColonyError::ledger(target, e))?;
        }
        let stored = ledger
            .complete_deliver(&delivery, disposition)
            .map_err(|e| ColonyError::ledger(target, e))?;

        self.carrier_mut(carrier)?.active = None;
        self.events.push(ColonyEvent::DropoffCompleted {
            carrier,
            promise: pair.dropoff.id,
            stored,
        });
        Ok(stored)
    }

    /// The transfer failed: release every lock the pair still holds.
    ///
    /// Before pickup the source's forbidden stock returns to `available`;
    /// goods already picked up are dropped as a pile at the carrier. The
    /// target's reservation is released in both cases. Returns the pile
    /// spawned, if any.
    pub fn fail_promise(&mut self, carrier: CarrierId) -> Result<Option<ContainerId>> {
        let pair = self.active_pair(carrier)?;
        self.carrier_mut(carrier)?.active = None;
        tracing::warn!(
            carrier = %carrier,
            source = %pair.pickup.ledger,
            target = %pair.dropoff.ledger,
            items = %pair.pickup.items(),
            "Rolling back failed transfer"
        );

        let mut first_error: Option<ColonyError> = None;
        let mut record = |result: std::result::Result<(), LedgerError>, container| {
            if let Err(source) = result {
                first_error.get_or_insert(ColonyError::ledger(container, source));
            }
        };

        let mut pile = None;
        match pair.stage {
            PairStage::AwaitingPickup => {
                let source = pair.pickup.ledger;
                if let Some(container) = self.containers.get_mut(&source) {
                    record(
                        container.ledger.cancel_distribution(&pair.pickup.transaction),
                        source,
                    );
                }
            }
            PairStage::AwaitingDropoff => {
                let own = self.carrier(carrier)?.container;
                let ledger = self.ledger_mut(own)?;
                match ledger.complete_distribution(&carried_transaction(&pair)) {
                    Ok(dropped) => {
                        let location = self.container(own)?.location;
                        pile = self.spawn_pile(location, dropped);
                    }
                    Err(err) => record(Err(err), own),
                }
            }
        }

        let target = pair.dropoff.ledger;
        if let Some(container) = self.containers.get_mut(&target) {
            record(
                container.ledger.cancel_deliver(&pair.dropoff.transaction),
                target,
            );
        }

        self.events
            .push(ColonyEvent::PromiseRolledBack { carrier, pair });
        match first_error {
            Some(err) => Err(err),
            None => Ok(pile),
        }
    }

    /// Single completion callback: `promise` finished, successfully or not.
    pub fn on_transfer_complete(
        &mut self,
        carrier: CarrierId,
        promise: PromiseId,
        succeeded: bool,
    ) -> Result<()> {
        let pair = self.active_pair(carrier)?;
        if promise != pair.pickup.id && promise != pair.dropoff.id {
            return Err(ColonyError::NoActivePromise(carrier));
        }
        if !succeeded {
            return self.fail_promise(carrier).map(|_| ());
        }
        if promise == pair.pickup.id {
            self.complete_pickup(carrier).map(|_| ())
        } else {
            self.complete_dropoff(carrier, Disposition::Store).map(|_| ())
        }
    }

    fn active_pair(&self, carrier: CarrierId) -> Result<PromisePair> {
        self.carrier(carrier)?
            .active
            .ok_or(ColonyError::NoActivePromise(carrier))
    }

    // ------------------------------------------------------------------
    // Auditing and events
    // ------------------------------------------------------------------

    /// Check every ledger's invariants and that every forbidden and
    /// reserved unit is backed by an outstanding promise.
    ///
    /// A mismatch means some caller locked stock outside the matcher or
    /// forgot to roll back a failed transfer.
    pub fn audit(&self) -> Result<()> {
        for container in self.containers.values() {
            let ledger = &container.ledger;
            ledger
                .check_invariants()
                .map_err(|e| ColonyError::ledger(container.id, e))?;

            let (expected_forbidden, expected_reserved) = self
                .carriers
                .values()
                .filter_map(|c| c.active.map(|pair| (c, pair)))
                .fold((Inventory::EMPTY, Inventory::EMPTY), |(f, r), (c, pair)| {
                    (
                        f + c.outstanding_forbidden(container.id),
                        r + pair.outstanding_reserved(container.id),
                    )
                });

            if ledger.forbidden() != expected_forbidden
                || ledger.reserved_capacity() != expected_reserved
            {
                if expected_forbidden.contains(&ledger.forbidden())
                    && expected_reserved.contains(&ledger.reserved_capacity())
                {
                    return Err(ColonyError::ledger(
                        container.id,
                        LedgerError::InvariantViolated(format!(
                            "promises expect forbidden {expected_forbidden} and reserved \
                             {expected_reserved}, ledger has {} and {}",
                            ledger.forbidden(),
                            ledger.reserved_capacity()
                        )),
                    ));
                }
                return Err(ColonyError::LeakedLock {
                    container: container.id,
                    forbidden: ledger.forbidden() - expected_forbidden,
                    reserved: ledger.reserved_capacity() - expected_reserved,
                });
            }
        }
        Ok(())
    }

    /// Drain events, including ledger changes recorded since the last call.
    ///
    /// Ledger changes are appended after the colony-level events, grouped
    /// by container in id order.
    pub fn take_events(&mut self) -> Vec<ColonyEvent> {
        let mut events = std::mem::take(&mut self.events);
        for container in self.containers.values_mut() {
            let id = container.id;
            events.extend(
                container
                    .ledger
                    .take_changes()
                    .into_iter()
                    .map(|change| ColonyEvent::LedgerChanged {
                        container: id,
                        change,
                    }),
            );
        }
        events
    }

    /// Sum of held stock across all containers, carriers included.
    #[must_use]
    pub fn total_held(&self) -> Inventory {
        self.containers
            .values()
            .fold(Inventory::EMPTY, |acc, c| acc + c.ledger.held())
    }

    /// Calculate a deterministic hash of the colony state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        self.containers.len().hash(&mut hasher);
        for (id, container) in &self.containers {
            id.hash(&mut hasher);
            container.location.x.to_bits().hash(&mut hasher);
            container.location.y.to_bits().hash(&mut hasher);
            let ledger = &container.ledger;
            ledger.held().hash(&mut hasher);
            ledger.forbidden().hash(&mut hasher);
            ledger.reserved_capacity().hash(&mut hasher);
            ledger.desire().target.hash(&mut hasher);
        }

        self.carriers.len().hash(&mut hasher);
        for (id, carrier) in &self.carriers {
            id.hash(&mut hasher);
            carrier.active.hash(&mut hasher);
        }
        hasher.finish()
    }

    pub(crate) const fn next_promise(&self) -> u64 {
        self.next_promise
    }

    /// Reassemble a colony from restored parts. Id counters resume past
    /// the highest id in use.
    pub(crate) fn from_parts(
        tick: u64,
        containers: BTreeMap<ContainerId, Container>,
        carriers: BTreeMap<CarrierId, Carrier>,
        next_promise: u64,
    ) -> Self {
        let next_container = containers.keys().last().map_or(1, |id| id.0 + 1);
        let next_carrier = carriers.keys().last().map_or(1, |id| id.0 + 1);
        let next_promise = carriers
            .values()
            .filter_map(|c| c.active)
            .map(|pair| pair.pickup.id.0.max(pair.dropoff.id.0))
            .max()
            .map_or(next_promise, |id| next_promise.max(id + 1));
        Self {
            tick,
            containers,
            carriers,
            next_container,
            next_carrier,
            next_promise,
            events: Vec::new(),
        }
    }
}

/// The lock a pair holds on its carrier's own ledger after pickup.
const fn carried_transaction(pair: &PromisePair) -> Transaction {
    Transaction {
        kind: TransactionKind::Distribute,
        items: pair.carried,
    }
}
