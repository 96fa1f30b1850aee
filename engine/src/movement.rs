//! Entry/exit checks for moving entities.

use std::time::Instant;

use bulwark_types::{BlockVector, EntityId};

use crate::world::WorldRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Living,
    Vehicle,
    /// Items, projectiles and the like. Never checked.
    Other,
}

/// A non-player entity moved.
#[derive(Debug, Clone)]
pub struct EntityMove {
    pub entity: EntityId,
    pub kind: EntityKind,
    pub world: String,
    pub from: BlockVector,
    pub to: BlockVector,
}

/// A player moved, possibly riding a vehicle.
#[derive(Debug, Clone)]
pub struct PlayerMove {
    pub world: String,
    pub vehicle: Option<EntityId>,
    pub from: BlockVector,
    pub to: BlockVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveVerdict {
    Allow,
    /// Cancel the move event.
    Cancel,
    /// Throw the player off their vehicle.
    Eject,
}

/// Runs each world's movement sessions against host move events.
///
/// Anything it cannot evaluate (unknown world, regions disabled) is
/// allowed: this is gameplay flow, not the authorization path.
#[derive(Debug, Clone)]
pub struct MovementGuard {
    worlds: WorldRegistry,
}

impl MovementGuard {
    #[must_use]
    pub fn new(worlds: WorldRegistry) -> Self {
        Self { worlds }
    }

    pub fn on_entity_move(&self, event: &EntityMove, now: Instant) -> MoveVerdict {
        if event.from == event.to || event.kind == EntityKind::Other {
            return MoveVerdict::Allow;
        }
        if self.test(&event.world, event.entity, event.from, event.to, now) {
            MoveVerdict::Allow
        } else {
            MoveVerdict::Cancel
        }
    }

    /// Checks the vehicle a player rides; the player is ejected instead of
    /// the move being cancelled.
    pub fn on_player_move(&self, event: &PlayerMove, now: Instant) -> MoveVerdict {
        let Some(vehicle) = event.vehicle else {
            return MoveVerdict::Allow;
        };
        if event.from == event.to {
            return MoveVerdict::Allow;
        }
        if self.test(&event.world, vehicle, event.from, event.to, now) {
            MoveVerdict::Allow
        } else {
            MoveVerdict::Eject
        }
    }

    fn test(
        &self,
        world: &str,
        entity: EntityId,
        from: BlockVector,
        to: BlockVector,
        now: Instant,
    ) -> bool {
        let Some(world) = self.worlds.get(world) else {
            tracing::debug!(%world, "Move in unknown world allowed");
            return true;
        };
        let settings = world.settings();
        if !settings.use_regions || !settings.entity_move {
            return true;
        }
        world
            .sessions()
            .test_move(world.index(), entity, from, to, now)
    }

    /// Forget a despawned entity.
    pub fn forget(&self, world: &str, entity: EntityId) {
        if let Some(world) = self.worlds.get(world) {
            world.sessions().evict(entity);
        }
    }

    /// Sweep idle sessions in every world. Returns how many were dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        self.worlds
            .worlds()
            .iter()
            .map(|world| world.sessions().sweep(now))
            .sum()
    }
}
