//! Loaded worlds.

use std::collections::HashMap;
use std::sync::Arc;

use bulwark_config::{MovementConfig, WorldSettings};
use bulwark_core::{RegionIndex, SessionCache};
use parking_lot::RwLock;

/// One world: its regions, effective settings and movement sessions.
#[derive(Debug)]
pub struct World {
    name: String,
    settings: WorldSettings,
    index: Arc<RegionIndex>,
    sessions: SessionCache,
}

impl World {
    #[must_use]
    pub fn new(name: impl Into<String>, settings: WorldSettings, movement: &MovementConfig) -> Self {
        let name = name.into();
        Self {
            index: Arc::new(RegionIndex::new(name.clone())),
            name,
            settings,
            sessions: SessionCache::with_default_rules(
                movement.session_idle(),
                movement.sweep_interval(),
            ),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    #[must_use]
    pub fn index(&self) -> &Arc<RegionIndex> {
        &self.index
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }
}

/// World name -> [`World`]. Cheap to clone; clones share the map.
#[derive(Debug, Clone, Default)]
pub struct WorldRegistry {
    worlds: Arc<RwLock<HashMap<String, Arc<World>>>>,
}

impl WorldRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `world`, replacing any world of the same name.
    pub fn insert(&self, world: World) -> Arc<World> {
        let world = Arc::new(world);
        let replaced = self
            .worlds
            .write()
            .insert(world.name().to_owned(), Arc::clone(&world));
        if replaced.is_some() {
            tracing::info!(world = %world.name(), "World replaced");
        } else {
            tracing::info!(world = %world.name(), "World loaded");
        }
        world
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<World>> {
        self.worlds.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<World>> {
        self.worlds.write().remove(name)
    }

    /// Snapshot of all worlds, sorted by name.
    #[must_use]
    pub fn worlds(&self) -> Vec<Arc<World>> {
        let mut worlds: Vec<_> = self.worlds.read().values().cloned().collect();
        worlds.sort_by(|a, b| a.name().cmp(b.name()));
        worlds
    }
}
