//! Ordered query results and attribute resolution.
//!
//! Resolution order:
//!
//! 1. Every region with a value for the key that the actor can see is a
//!    candidate, at its own priority.
//! 2. A candidate is dropped when a region descending from it is also in
//!    the set and has its own visible value. A child's explicit value
//!    therefore beats its parent's whatever the priorities, while an
//!    unset child leaves the parent competing normally.
//! 3. Candidates are ordered by descending priority, then by insertion
//!    order. No candidate is an ancestor of another, so child-before-parent
//!    never has to break a tie.
//! 4. The first candidate wins; with no candidate the catalog default
//!    applies.
//!
//! Nothing here interprets values. Combination rules such as "deny wins"
//! are applied by callers on top of [`ApplicableSet::candidates`].

use std::sync::Arc;

use bulwark_types::{Actor, AttributeKey, AttributeValue, RegionId};

use crate::region::Region;

/// Regions matched by one spatial query, in resolution order.
#[derive(Debug, Clone, Default)]
pub struct ApplicableSet {
    /// Sorted by priority desc, then insertion order.
    members: Vec<Arc<Region>>,
}

/// A value offered by one region of the set.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// The region holding the value; its priority orders the candidate.
    pub region: &'a Region,
    pub value: &'a AttributeValue,
}

impl Candidate<'_> {
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.region.priority()
    }
}

/// Outcome of [`ApplicableSet::resolve_attribute`].
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Region(Candidate<'a>),
    /// No region defines the attribute; the catalog default, if any.
    Default(Option<AttributeValue>),
}

impl Resolved<'_> {
    #[must_use]
    pub fn value(&self) -> Option<&AttributeValue> {
        match self {
            Resolved::Region(candidate) => Some(candidate.value),
            Resolved::Default(value) => value.as_ref(),
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<AttributeValue> {
        match self {
            Resolved::Region(candidate) => Some(candidate.value.clone()),
            Resolved::Default(value) => value,
        }
    }

    /// Region holding the winning value.
    #[must_use]
    pub fn source(&self) -> Option<&Region> {
        match self {
            Resolved::Region(candidate) => Some(candidate.region),
            Resolved::Default(_) => None,
        }
    }
}

impl ApplicableSet {
    /// Build a set from `(region, insertion sequence)` pairs.
    ///
    /// Every ancestor of a member should be present too; a parent missing
    /// from the set simply ends that member's chain.
    #[must_use]
    pub fn new(mut entries: Vec<(Arc<Region>, u64)>) -> Self {
        entries.sort_by(|(a, a_seq), (b, b_seq)| {
            b.priority().cmp(&a.priority()).then(a_seq.cmp(b_seq))
        });
        let members = entries.into_iter().map(|(region, _)| region).collect();
        Self { members }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// All members in resolution order, ancestors included.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.members.iter().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &RegionId) -> Option<&Region> {
        position(&self.members, id).map(|pos| self.members[pos].as_ref())
    }

    /// Every region whose visible value for `key` is not overridden by a
    /// descendant in the set, best first.
    ///
    /// `actor` decides whether group-restricted values apply; without one
    /// only unrestricted values are visible.
    #[must_use]
    pub fn candidates(&self, key: AttributeKey, actor: Option<&Actor>) -> Vec<Candidate<'_>> {
        let values: Vec<Option<&AttributeValue>> = self
            .members
            .iter()
            .map(|region| own_value(region, key, actor))
            .collect();

        let mut overridden = vec![false; self.members.len()];
        for (member, value) in self.members.iter().zip(&values) {
            if value.is_none() {
                continue;
            }
            let mut parent = member.parent();
            while let Some(parent_id) = parent {
                let Some(pos) = position(&self.members, parent_id) else {
                    break;
                };
                if overridden[pos] {
                    // the rest of this chain was already marked
                    break;
                }
                overridden[pos] = true;
                parent = self.members[pos].parent();
            }
        }

        self.members
            .iter()
            .zip(values)
            .zip(overridden)
            .filter_map(|((region, value), overridden)| {
                if overridden {
                    return None;
                }
                value.map(|value| Candidate {
                    region: region.as_ref(),
                    value,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn resolve_attribute(&self, key: AttributeKey, actor: Option<&Actor>) -> Resolved<'_> {
        self.candidates(key, actor)
            .into_iter()
            .next()
            .map_or_else(|| Resolved::Default(key.default_value()), Resolved::Region)
    }
}

/// The value `region` itself offers `actor` for `key`.
fn own_value<'a>(
    region: &'a Region,
    key: AttributeKey,
    actor: Option<&Actor>,
) -> Option<&'a AttributeValue> {
    let setting = region.flag(key)?;
    let in_group = actor.is_some_and(|actor| region.in_group(setting.group, actor));
    setting.value_for(in_group)
}

fn position(members: &[Arc<Region>], id: &RegionId) -> Option<usize> {
    members.iter().position(|region| region.id() == id)
}
