//! Withdraw/deposit permissions per role.

use serde::{Deserialize, Serialize};

/// Who is interacting with a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A hauling dweller moving goods between containers.
    Carrier,
    /// A construction job consuming materials on site.
    Builder,
    /// A production building consuming inputs or emitting outputs.
    Producer,
    /// The container's owner (player or script).
    Owner,
}

impl Role {
    /// All roles in canonical order.
    pub const ALL: [Self; 4] = [Self::Carrier, Self::Builder, Self::Producer, Self::Owner];

    const fn bit(self) -> u8 {
        match self {
            Self::Carrier => 1,
            Self::Builder => 1 << 1,
            Self::Producer => 1 << 2,
            Self::Owner => 1 << 3,
        }
    }
}

/// A set of roles stored as a bitset.
///
/// Serializes as a list of roles, e.g. `[Carrier, Owner]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Role>", into = "Vec<Role>")]
pub struct RoleSet(u8);

impl RoleSet {
    /// No roles.
    pub const EMPTY: Self = Self(0);

    /// Every role.
    pub const ALL: Self = Self(0b1111);

    /// Set holding exactly the given roles.
    #[must_use]
    pub fn of(roles: &[Role]) -> Self {
        Self(roles.iter().fold(0, |bits, role| bits | role.bit()))
    }

    /// True if `role` is in the set.
    #[must_use]
    pub const fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }
}

impl From<Vec<Role>> for RoleSet {
    fn from(roles: Vec<Role>) -> Self {
        Self::of(&roles)
    }
}

impl From<RoleSet> for Vec<Role> {
    fn from(set: RoleSet) -> Self {
        Role::ALL.into_iter().filter(|r| set.contains(*r)).collect()
    }
}

/// Which roles may withdraw from or deposit into a container.
///
/// Immutable; build one with the preset constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PermissionPolicy {
    withdraw: RoleSet,
    deposit: RoleSet,
}

impl PermissionPolicy {
    /// Nobody may withdraw or deposit.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            withdraw: RoleSet::EMPTY,
            deposit: RoleSet::EMPTY,
        }
    }

    /// Every role may withdraw and deposit.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            withdraw: RoleSet::ALL,
            deposit: RoleSet::ALL,
        }
    }

    /// The given roles may deposit; nobody may withdraw.
    ///
    /// Typical for construction sites.
    #[must_use]
    pub fn deposit_only(roles: &[Role]) -> Self {
        Self {
            withdraw: RoleSet::EMPTY,
            deposit: RoleSet::of(roles),
        }
    }

    /// The given roles may withdraw; nobody may deposit.
    ///
    /// Typical for dropped item piles.
    #[must_use]
    pub fn withdraw_only(roles: &[Role]) -> Self {
        Self {
            withdraw: RoleSet::of(roles),
            deposit: RoleSet::EMPTY,
        }
    }

    /// Explicit role lists for each direction.
    #[must_use]
    pub fn for_roles(withdraw: &[Role], deposit: &[Role]) -> Self {
        Self {
            withdraw: RoleSet::of(withdraw),
            deposit: RoleSet::of(deposit),
        }
    }

    /// Can `role` take goods out?
    #[must_use]
    pub const fn can_withdraw(&self, role: Role) -> bool {
        self.withdraw.contains(role)
    }

    /// Can `role` put goods in?
    #[must_use]
    pub const fn can_deposit(&self, role: Role) -> bool {
        self.deposit.contains(role)
    }
}
