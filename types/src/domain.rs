//! Principal sets used for region ownership and membership.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, PrincipalId};

/// Answers group membership for a principal.
///
/// Group data lives outside the engine (permission plugin, directory);
/// callers hand in whatever lookup they have.
pub trait GroupLookup {
    fn in_group(&self, principal: &PrincipalId, group: &GroupId) -> bool;
}

/// Lookup for callers without group information.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGroups;

impl GroupLookup for NoGroups {
    fn in_group(&self, _principal: &PrincipalId, _group: &GroupId) -> bool {
        false
    }
}

/// A set of principals and groups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Domain {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    players: BTreeSet<PrincipalId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    groups: BTreeSet<GroupId>,
}

impl Domain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_player(mut self, player: PrincipalId) -> Self {
        self.players.insert(player);
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.groups.insert(group);
        self
    }

    pub fn add_player(&mut self, player: PrincipalId) -> bool {
        self.players.insert(player)
    }

    pub fn remove_player(&mut self, player: &PrincipalId) -> bool {
        self.players.remove(player)
    }

    pub fn add_group(&mut self, group: GroupId) -> bool {
        self.groups.insert(group)
    }

    pub fn remove_group(&mut self, group: &GroupId) -> bool {
        self.groups.remove(group)
    }

    /// Union `other` into this domain. Returns how many entries were new.
    pub fn add_all(&mut self, other: &Domain) -> usize {
        let players = other
            .players
            .iter()
            .filter(|p| self.players.insert(**p))
            .count();
        let groups = other
            .groups
            .iter()
            .filter(|g| self.groups.insert((*g).clone()))
            .count();
        players + groups
    }

    /// Remove every entry of `other`. Returns how many entries were present.
    pub fn remove_all_of(&mut self, other: &Domain) -> usize {
        let players = other
            .players
            .iter()
            .filter(|p| self.players.remove(*p))
            .count();
        let groups = other
            .groups
            .iter()
            .filter(|g| self.groups.remove(*g))
            .count();
        players + groups
    }

    /// Empty the domain.
    pub fn clear(&mut self) {
        self.players.clear();
        self.groups.clear();
    }

    /// Direct match, or any of the principal's groups listed here.
    #[must_use]
    pub fn contains(&self, principal: &PrincipalId, lookup: &dyn GroupLookup) -> bool {
        self.players.contains(principal)
            || self
                .groups
                .iter()
                .any(|group| lookup.in_group(principal, group))
    }

    #[must_use]
    pub fn contains_player(&self, principal: &PrincipalId) -> bool {
        self.players.contains(principal)
    }

    #[must_use]
    pub fn contains_group(&self, group: &GroupId) -> bool {
        self.groups.contains(group)
    }

    pub fn players(&self) -> impl Iterator<Item = &PrincipalId> {
        self.players.iter()
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupId> {
        self.groups.iter()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.players.len() + self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.groups.is_empty()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for player in &self.players {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{player}")?;
            first = false;
        }
        for group in &self.groups {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "g:{group}")?;
            first = false;
        }
        Ok(())
    }
}

/// The principal a query or command runs on behalf of, with the groups the
/// host resolved for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    principal: PrincipalId,
    groups: BTreeSet<GroupId>,
}

impl Actor {
    #[must_use]
    pub fn new(principal: PrincipalId) -> Self {
        Self {
            principal,
            groups: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.groups.insert(group);
        self
    }

    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupId> {
        self.groups.iter()
    }
}

impl GroupLookup for Actor {
    fn in_group(&self, principal: &PrincipalId, group: &GroupId) -> bool {
        *principal == self.principal && self.groups.contains(group)
    }
}
