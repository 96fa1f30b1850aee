//! A single protected region.

use std::collections::BTreeMap;
use std::fmt;

use bulwark_types::{
    Actor, AttributeError, AttributeKey, BlockVector, Bounds, Domain, FlagSetting, GroupLookup,
    PrincipalId, RegionGroup, RegionId,
};
use serde::{Deserialize, Serialize};

/// Which of a region's two domains an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainRole {
    Owners,
    Members,
}

impl DomainRole {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            DomainRole::Owners => "owners",
            DomainRole::Members => "members",
        }
    }
}

impl fmt::Display for DomainRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Named, prioritized, bounded policy object.
///
/// The parent is stored as a plain id. Acyclicity is checked by
/// [`RegionIndex`](crate::RegionIndex) when the region is added or
/// re-parented, so a free-standing `Region` may name any parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    id: RegionId,
    #[serde(default)]
    priority: i32,
    bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<RegionId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    flags: BTreeMap<AttributeKey, FlagSetting>,
    #[serde(default)]
    owners: Domain,
    #[serde(default)]
    members: Domain,
}

impl Region {
    #[must_use]
    pub fn new(id: RegionId, bounds: Bounds) -> Self {
        Self {
            id,
            priority: 0,
            bounds,
            parent: None,
            flags: BTreeMap::new(),
            owners: Domain::new(),
            members: Domain::new(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: RegionId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_flag(mut self, key: AttributeKey, setting: FlagSetting) -> Result<Self, AttributeError> {
        self.set_flag(key, setting)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_owners(mut self, owners: Domain) -> Self {
        self.owners = owners;
        self
    }

    #[must_use]
    pub fn with_members(mut self, members: Domain) -> Self {
        self.members = members;
        self
    }

    #[must_use]
    pub fn id(&self) -> &RegionId {
        &self.id
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    #[must_use]
    pub fn contains(&self, point: BlockVector) -> bool {
        self.bounds.contains(point)
    }

    #[must_use]
    pub fn parent(&self) -> Option<&RegionId> {
        self.parent.as_ref()
    }

    /// Unchecked; the index owns the acyclicity check.
    pub(crate) fn set_parent_unchecked(&mut self, parent: Option<RegionId>) {
        self.parent = parent;
    }

    #[must_use]
    pub fn flag(&self, key: AttributeKey) -> Option<&FlagSetting> {
        self.flags.get(&key)
    }

    pub fn flags(&self) -> impl Iterator<Item = (AttributeKey, &FlagSetting)> {
        self.flags.iter().map(|(key, setting)| (*key, setting))
    }

    /// Store a setting, replacing any previous one. An unset setting clears
    /// the key.
    pub fn set_flag(
        &mut self,
        key: AttributeKey,
        setting: FlagSetting,
    ) -> Result<Option<FlagSetting>, AttributeError> {
        if setting.is_unset() {
            return Ok(self.flags.remove(&key));
        }
        for value in [&setting.value, &setting.group_value].into_iter().flatten() {
            key.check(value)?;
        }
        Ok(self.flags.insert(key, setting))
    }

    pub fn clear_flag(&mut self, key: AttributeKey) -> Option<FlagSetting> {
        self.flags.remove(&key)
    }

    /// Re-check every stored value against the catalog. Used after
    /// deserialization, which bypasses [`Region::set_flag`].
    pub fn validate(&self) -> Result<(), AttributeError> {
        for (key, setting) in &self.flags {
            for value in [&setting.value, &setting.group_value].into_iter().flatten() {
                key.check(value)?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn owners(&self) -> &Domain {
        &self.owners
    }

    #[must_use]
    pub fn members(&self) -> &Domain {
        &self.members
    }

    pub fn owners_mut(&mut self) -> &mut Domain {
        &mut self.owners
    }

    pub fn members_mut(&mut self) -> &mut Domain {
        &mut self.members
    }

    #[must_use]
    pub fn domain(&self, role: DomainRole) -> &Domain {
        match role {
            DomainRole::Owners => &self.owners,
            DomainRole::Members => &self.members,
        }
    }

    pub fn domain_mut(&mut self, role: DomainRole) -> &mut Domain {
        match role {
            DomainRole::Owners => &mut self.owners,
            DomainRole::Members => &mut self.members,
        }
    }

    #[must_use]
    pub fn is_owner(&self, principal: &PrincipalId, groups: &dyn GroupLookup) -> bool {
        self.owners.contains(principal, groups)
    }

    /// Owners count as members.
    #[must_use]
    pub fn is_member(&self, principal: &PrincipalId, groups: &dyn GroupLookup) -> bool {
        self.is_owner(principal, groups) || self.members.contains(principal, groups)
    }

    /// Whether `actor` falls in `group` of this region.
    #[must_use]
    pub fn in_group(&self, group: RegionGroup, actor: &Actor) -> bool {
        match group {
            RegionGroup::Owners => self.is_owner(actor.principal(), actor),
            RegionGroup::Members => self.is_member(actor.principal(), actor),
        }
    }
}
