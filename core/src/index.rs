//! Per-world region index.
//!
//! Regions are held as `Arc<Region>` behind a `parking_lot::RwLock`. Queries
//! take the read lock just long enough to clone the matching `Arc`s, so an
//! [`ApplicableSet`] is an immutable snapshot: later mutations clone the
//! region they touch (`Arc::make_mut`) instead of changing it in place.

use std::collections::HashMap;
use std::sync::Arc;

use bulwark_types::{AttributeKey, BlockVector, Bounds, Domain, FlagSetting, PrincipalId, RegionId};
use parking_lot::RwLock;

use crate::applicable::ApplicableSet;
use crate::error::RegionError;
use crate::region::{DomainRole, Region};

struct Entry {
    region: Arc<Region>,
    /// Insertion sequence, the final tie-break of resolution order.
    seq: u64,
}

#[derive(Default)]
struct IndexState {
    regions: HashMap<RegionId, Entry>,
    next_seq: u64,
}

impl IndexState {
    fn insert(&mut self, region: Region) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.regions.insert(
            region.id().clone(),
            Entry {
                region: Arc::new(region),
                seq,
            },
        );
    }

    fn entry_mut(&mut self, id: &RegionId) -> Result<&mut Entry, RegionError> {
        self.regions
            .get_mut(id)
            .ok_or_else(|| RegionError::NotFound(id.clone()))
    }

    /// Fails if `parent` is `child` or has `child` among its ancestors.
    fn check_parent(&self, child: &RegionId, parent: &RegionId) -> Result<(), RegionError> {
        if child == parent {
            return Err(RegionError::CyclicParent {
                child: child.clone(),
                parent: parent.clone(),
            });
        }
        if !self.regions.contains_key(parent) {
            return Err(RegionError::NotFound(parent.clone()));
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(RegionError::CyclicParent {
                    child: child.clone(),
                    parent: parent.clone(),
                });
            }
            cursor = self
                .regions
                .get(current)
                .and_then(|entry| entry.region.parent());
        }
        Ok(())
    }
}

/// All regions of one world.
pub struct RegionIndex {
    world: String,
    state: RwLock<IndexState>,
}

impl RegionIndex {
    #[must_use]
    pub fn new(world: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            state: RwLock::new(IndexState::default()),
        }
    }

    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    /// Regions containing `point`, plus every ancestor of those regions.
    #[must_use]
    pub fn query(&self, point: BlockVector) -> ApplicableSet {
        let state = self.state.read();
        let mut picked: HashMap<&RegionId, (Arc<Region>, u64)> = HashMap::new();
        for (id, entry) in &state.regions {
            if !entry.region.contains(point) {
                continue;
            }
            picked.insert(id, (Arc::clone(&entry.region), entry.seq));
            let mut parent = entry.region.parent();
            while let Some(parent_id) = parent {
                if picked.contains_key(parent_id) {
                    break;
                }
                let Some(ancestor) = state.regions.get(parent_id) else {
                    break;
                };
                picked.insert(parent_id, (Arc::clone(&ancestor.region), ancestor.seq));
                parent = ancestor.region.parent();
            }
        }
        let members: Vec<(Arc<Region>, u64)> = picked.into_values().collect();
        drop(state);

        tracing::debug!(world = %self.world, %point, matched = members.len(), "Region query");
        ApplicableSet::new(members)
    }

    /// Insert a new region. Its parent, if any, must already be indexed.
    pub fn add(&self, region: Region) -> Result<(), RegionError> {
        let mut state = self.state.write();
        if state.regions.contains_key(region.id()) {
            return Err(RegionError::DuplicateId(region.id().clone()));
        }
        if let Some(parent) = region.parent() {
            state.check_parent(region.id(), parent)?;
        }
        tracing::info!(world = %self.world, region = %region.id(), "Region added");
        state.insert(region);
        Ok(())
    }

    /// Remove a region. Its children are re-parented to its own parent.
    pub fn remove(&self, id: &RegionId) -> Result<Arc<Region>, RegionError> {
        let mut state = self.state.write();
        let removed = state
            .regions
            .remove(id)
            .ok_or_else(|| RegionError::NotFound(id.clone()))?
            .region;

        let grandparent = removed.parent().cloned();
        let mut reparented = 0usize;
        for entry in state.regions.values_mut() {
            if entry.region.parent() == Some(id) {
                Arc::make_mut(&mut entry.region).set_parent_unchecked(grandparent.clone());
                reparented += 1;
            }
        }
        tracing::info!(world = %self.world, region = %id, reparented, "Region removed");
        Ok(removed)
    }

    /// Set or clear a region's parent.
    pub fn set_parent(&self, id: &RegionId, parent: Option<RegionId>) -> Result<(), RegionError> {
        let mut state = self.state.write();
        if !state.regions.contains_key(id) {
            return Err(RegionError::NotFound(id.clone()));
        }
        if let Some(parent) = &parent {
            state.check_parent(id, parent)?;
        }
        let entry = state.entry_mut(id)?;
        Arc::make_mut(&mut entry.region).set_parent_unchecked(parent);
        Ok(())
    }

    pub fn set_priority(&self, id: &RegionId, priority: i32) -> Result<(), RegionError> {
        self.update(id, |region| region.set_priority(priority))
    }

    pub fn set_flag(
        &self,
        id: &RegionId,
        key: AttributeKey,
        setting: FlagSetting,
    ) -> Result<Option<FlagSetting>, RegionError> {
        let mut state = self.state.write();
        let entry = state.entry_mut(id)?;
        // validate before cloning so a rejected value leaves the snapshot alone
        for value in [&setting.value, &setting.group_value].into_iter().flatten() {
            key.check(value)?;
        }
        Ok(Arc::make_mut(&mut entry.region).set_flag(key, setting)?)
    }

    pub fn clear_flag(
        &self,
        id: &RegionId,
        key: AttributeKey,
    ) -> Result<Option<FlagSetting>, RegionError> {
        self.update(id, |region| region.clear_flag(key))
    }

    /// Replace a region's bounds, keeping everything else.
    pub fn redefine(&self, id: &RegionId, bounds: Bounds) -> Result<(), RegionError> {
        self.update(id, |region| region.set_bounds(bounds))?;
        tracing::info!(world = %self.world, region = %id, "Region redefined");
        Ok(())
    }

    /// Apply `f` to a region under the write lock.
    ///
    /// `f` cannot change the id or the parent; those go through
    /// [`RegionIndex::set_parent`] so the acyclicity check runs.
    pub fn update<R>(&self, id: &RegionId, f: impl FnOnce(&mut Region) -> R) -> Result<R, RegionError> {
        let mut state = self.state.write();
        let entry = state.entry_mut(id)?;
        Ok(f(Arc::make_mut(&mut entry.region)))
    }

    /// Mutate one of a region's domains under the write lock.
    pub fn update_domain<R>(
        &self,
        id: &RegionId,
        role: DomainRole,
        f: impl FnOnce(&mut Domain) -> R,
    ) -> Result<R, RegionError> {
        self.update(id, |region| f(region.domain_mut(role)))
    }

    #[must_use]
    pub fn get(&self, id: &RegionId) -> Option<Arc<Region>> {
        self.state
            .read()
            .regions
            .get(id)
            .map(|entry| Arc::clone(&entry.region))
    }

    #[must_use]
    pub fn contains(&self, id: &RegionId) -> bool {
        self.state.read().regions.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every region in insertion order.
    #[must_use]
    pub fn regions(&self) -> Vec<Arc<Region>> {
        let state = self.state.read();
        let mut entries: Vec<&Entry> = state.regions.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
            .into_iter()
            .map(|entry| Arc::clone(&entry.region))
            .collect()
    }

    /// Swap the whole region set, e.g. after loading from storage.
    ///
    /// The new set is built and checked off to the side; on error the index
    /// is left untouched. Input order becomes insertion order.
    pub fn replace_all(&self, regions: Vec<Region>) -> Result<(), RegionError> {
        let mut next = IndexState::default();
        let mut parents = Vec::new();
        for mut region in regions {
            if next.regions.contains_key(region.id()) {
                return Err(RegionError::DuplicateId(region.id().clone()));
            }
            if let Some(parent) = region.parent().cloned() {
                parents.push((region.id().clone(), parent));
                region.set_parent_unchecked(None);
            }
            next.insert(region);
        }
        for (child, parent) in parents {
            next.check_parent(&child, &parent)?;
            let entry = next.entry_mut(&child)?;
            Arc::make_mut(&mut entry.region).set_parent_unchecked(Some(parent));
        }

        let count = next.regions.len();
        *self.state.write() = next;
        tracing::info!(world = %self.world, count, "Region index replaced");
        Ok(())
    }

    /// Number of regions listing `principal` directly as an owner.
    #[must_use]
    pub fn count_owned_by(&self, principal: &PrincipalId) -> usize {
        self.state
            .read()
            .regions
            .values()
            .filter(|entry| entry.region.owners().contains_player(principal))
            .count()
    }
}

impl std::fmt::Debug for RegionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionIndex")
            .field("world", &self.world)
            .field("regions", &self.len())
            .finish()
    }
}
