//! Test fixtures and helpers.
//!
//! Pre-built colonies, container presets and scripted path oracles for
//! consistent testing.

use colony_core::prelude::*;
use fixed::types::I32F32;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Shorthand for a single-resource inventory.
#[must_use]
pub fn items(resource: ResourceType, count: u32) -> Inventory {
    Inventory::single(resource, count)
}

/// Oracle that finds a path between any two points.
#[must_use]
pub fn always_reachable(_: Vec2Fixed, _: Vec2Fixed) -> bool {
    true
}

/// Oracle that never finds a path.
#[must_use]
pub fn never_reachable(_: Vec2Fixed, _: Vec2Fixed) -> bool {
    false
}

/// Oracle that refuses any path touching one of the blocked points.
#[derive(Debug, Clone, Default)]
pub struct BlockedOracle {
    /// Points that cannot be reached or left.
    pub blocked: Vec<Vec2Fixed>,
}

impl BlockedOracle {
    /// Block the given points.
    #[must_use]
    pub fn new(blocked: &[Vec2Fixed]) -> Self {
        Self {
            blocked: blocked.to_vec(),
        }
    }
}

impl PathOracle for BlockedOracle {
    fn is_path_feasible(&self, from: Vec2Fixed, to: Vec2Fixed) -> bool {
        !self.blocked.contains(&from) && !self.blocked.contains(&to)
    }
}

/// A construction site: accepts exactly its target from carriers.
pub fn construction_site(colony: &mut Colony, location: Vec2Fixed, target: Inventory) -> ContainerId {
    colony.spawn_container(ContainerSpec {
        name: "construction site".into(),
        kind: ContainerKind::Building,
        location,
        capacity: CapacityPolicy::PerType(target),
        permission: PermissionPolicy::deposit_only(&[Role::Carrier, Role::Builder]),
        desire: Desire::new(target),
        profile: LogisticsProfile {
            is_cache: false,
            priority: 1,
        },
        ..Default::default()
    })
}

/// A stockpile holding `held` that wants to keep `target` and gives away
/// the rest.
pub fn stockpile(
    colony: &mut Colony,
    location: Vec2Fixed,
    held: Inventory,
    target: Inventory,
) -> ContainerId {
    colony.spawn_container(ContainerSpec {
        name: "stockpile".into(),
        kind: ContainerKind::Stockpile,
        location,
        capacity: CapacityPolicy::TotalWeight(400),
        permission: PermissionPolicy::all(),
        desire: Desire::new(target),
        held,
        profile: LogisticsProfile {
            is_cache: true,
            priority: 0,
        },
    })
}

/// A carrier with unlimited carrying capacity.
pub fn porter(colony: &mut Colony, location: Vec2Fixed) -> CarrierId {
    colony.spawn_carrier(CarrierSpec {
        name: "porter".into(),
        location,
        capacity: CapacityPolicy::Unlimited,
    })
}

/// A two-container colony with one idle carrier.
#[derive(Debug, Clone)]
pub struct PairColony {
    /// The colony.
    pub colony: Colony,
    /// Receiving ledger: capacity and target `{Wood: 10}`.
    pub site: ContainerId,
    /// Distributing ledger: holds `{Wood: 4}` and wants nothing.
    pub pile: ContainerId,
    /// The idle carrier, if spawned.
    pub carrier: Option<CarrierId>,
}

/// Site short of 10 wood, a pile of 4 wood, and optionally one carrier.
#[must_use]
pub fn pair_colony(with_carrier: bool) -> PairColony {
    let mut colony = Colony::new();
    let site = construction_site(&mut colony, pos(0, 0), items(ResourceType::Wood, 10));
    let pile = colony
        .spawn_pile(pos(6, 0), items(ResourceType::Wood, 4))
        .unwrap_or(ContainerId(0));
    let carrier = with_carrier.then(|| porter(&mut colony, pos(3, 0)));
    PairColony {
        colony,
        site,
        pile,
        carrier,
    }
}

/// A mixed colony: several sites, stockpiles and piles spread over a grid.
#[must_use]
pub fn village(carriers: usize) -> Colony {
    use ResourceType::{Food, Stone, Tools, Wood};

    let mut colony = Colony::new();
    for i in 0..4 {
        let target = Inventory::from_pairs(&[(Wood, 8 + i), (Stone, 4)]);
        construction_site(&mut colony, pos(i as i32 * 10, 0), target);
    }
    stockpile(
        &mut colony,
        pos(20, 20),
        Inventory::from_pairs(&[(Wood, 30), (Stone, 12), (Food, 20)]),
        Inventory::single(Food, 10),
    );
    stockpile(
        &mut colony,
        pos(-20, 20),
        Inventory::from_pairs(&[(Stone, 10), (Tools, 3)]),
        Inventory::EMPTY,
    );
    colony.spawn_pile(pos(5, 5), Inventory::from_pairs(&[(Wood, 6), (Food, 2)]));
    colony.spawn_pile(pos(35, -5), items(Stone, 3));
    for i in 0..carriers {
        porter(&mut colony, pos(i as i32 * 3 - 10, 10));
    }
    colony
}

/// Advance one tick: match, then complete every promise pair at once.
///
/// Stands in for a behavior layer with instantaneous carriers.
pub fn step_instant<O: PathOracle + ?Sized>(
    colony: &mut Colony,
    matcher: &mut LogisticsMatcher,
    oracle: &O,
) -> MatchReport {
    colony.advance_tick();
    let report = matcher.run_tick(colony, oracle);
    for assignment in &report.assignments {
        let done = colony
            .complete_pickup(assignment.carrier)
            .and_then(|_| colony.complete_dropoff(assignment.carrier, Disposition::Store));
        if let Err(err) = done {
            tracing::warn!(carrier = %assignment.carrier, error = %err, "Instant transfer failed");
            let _ = colony.fail_promise(assignment.carrier);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_colony_layout() {
        let fixture = pair_colony(true);
        let colony = &fixture.colony;
        assert_eq!(
            colony.ledger(fixture.pile).unwrap().available(),
            items(ResourceType::Wood, 4)
        );
        assert!(colony.ledger(fixture.site).unwrap().held().is_empty());
        assert_eq!(colony.idle_carriers().len(), 1);
    }

    #[test]
    fn test_blocked_oracle() {
        let oracle = BlockedOracle::new(&[pos(1, 1)]);
        assert!(oracle.is_path_feasible(pos(0, 0), pos(2, 2)));
        assert!(!oracle.is_path_feasible(pos(1, 1), pos(2, 2)));
        assert!(!oracle.is_path_feasible(pos(0, 0), pos(1, 1)));
    }

    #[test]
    fn test_step_instant_moves_goods() {
        let mut fixture = pair_colony(true);
        let mut matcher = LogisticsMatcher::default();
        let report = step_instant(&mut fixture.colony, &mut matcher, &always_reachable);

        assert_eq!(report.units_assigned(), 4);
        assert_eq!(
            fixture.colony.ledger(fixture.site).unwrap().held(),
            items(ResourceType::Wood, 4)
        );
        assert!(fixture.colony.audit().is_ok());
    }

    #[test]
    fn test_village_settles() {
        let mut colony = village(4);
        let before = colony.total_held();
        let mut matcher = LogisticsMatcher::default();
        for _ in 0..50 {
            step_instant(&mut colony, &mut matcher, &always_reachable);
        }
        assert_eq!(colony.total_held(), before);
        assert!(colony.audit().is_ok());
    }
}
