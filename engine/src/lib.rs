//! Host-facing surface of bulwark.
//!
//! [`Engine`] bundles the loaded worlds, the identity resolver and the
//! collaborators a host plugs in (permissions, quotas, hooks). The host
//! calls [`Engine::tick`] once per simulation tick; that is where the
//! results of background work are applied.

#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use bulwark_config::GuardConfig;
use bulwark_core::RegionStore;
use bulwark_identity::{IdentityResolver, ProfileService, SyncHandle, SyncQueue};
use tokio::runtime::Handle;

mod commands;
mod error;
mod hooks;
mod movement;
mod permissions;
mod source;
mod supervisor;
mod world;

pub use commands::{CommandStatus, MembershipArgs, Targets, WAIT_NOTICE, report_failure};
pub use error::CommandError;
pub use hooks::{ChangeCause, HookOutcome, NoHooks, PendingChange, RegionHooks};
pub use movement::{EntityKind, EntityMove, MoveVerdict, MovementGuard, PlayerMove};
pub use permissions::{ConfiguredQuota, OwnerPermissionModel, PermissionModel, QuotaPolicy};
pub use source::{CommandSource, MessageSink};
pub use supervisor::{TaskGuard, TaskInfo, TaskSupervisor};
pub use world::{World, WorldRegistry};

/// Queued jobs run per tick at most.
const TICK_JOB_BUDGET: usize = 256;

// ============================================================================
// Engine
// ============================================================================

pub struct Engine {
    config: Arc<GuardConfig>,
    worlds: WorldRegistry,
    movement: MovementGuard,
    resolver: IdentityResolver,
    runtime: Handle,
    queue: SyncQueue,
    supervisor: TaskSupervisor,
    permissions: Arc<dyn PermissionModel>,
    quota: Arc<dyn QuotaPolicy>,
    hooks: Arc<dyn RegionHooks>,
    sweep_interval: Duration,
    last_sweep: Instant,
}

impl Engine {
    /// Engine with the owner-based permission model, config quotas and no
    /// hooks. Background work is spawned on `runtime`.
    #[must_use]
    pub fn new(config: GuardConfig, profiles: Arc<dyn ProfileService>, runtime: Handle) -> Self {
        let config = Arc::new(config);
        let worlds = WorldRegistry::new();
        let resolver = IdentityResolver::new(
            profiles,
            runtime.clone(),
            config.resolver.max_concurrent_lookups,
        );
        Self {
            movement: MovementGuard::new(worlds.clone()),
            worlds,
            resolver,
            runtime,
            queue: SyncQueue::new(),
            supervisor: TaskSupervisor::new(),
            permissions: Arc::new(OwnerPermissionModel),
            quota: Arc::new(ConfiguredQuota::new(Arc::clone(&config))),
            hooks: Arc::new(NoHooks),
            sweep_interval: config.movement.sweep_interval(),
            last_sweep: Instant::now(),
            config,
        }
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionModel>) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn with_quota(mut self, quota: Arc<dyn QuotaPolicy>) -> Self {
        self.quota = quota;
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn RegionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    #[must_use]
    pub fn worlds(&self) -> &WorldRegistry {
        &self.worlds
    }

    #[must_use]
    pub fn movement(&self) -> &MovementGuard {
        &self.movement
    }

    #[must_use]
    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.supervisor
    }

    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Handle for posting work to the simulation thread.
    #[must_use]
    pub fn sync_handle(&self) -> SyncHandle {
        self.queue.handle()
    }

    /// Register an empty world with settings from the config.
    pub fn create_world(&self, name: &str) -> Arc<World> {
        self.worlds.insert(World::new(
            name,
            self.config.world(name),
            &self.config.movement,
        ))
    }

    /// Register a world and fill it from `store`.
    pub fn load_world(&self, name: &str, store: &dyn RegionStore) -> Result<Arc<World>, CommandError> {
        let regions = store.load()?;
        let world = World::new(name, self.config.world(name), &self.config.movement);
        world.index().replace_all(regions)?;
        Ok(self.worlds.insert(world))
    }

    pub fn save_world(&self, name: &str, store: &dyn RegionStore) -> Result<(), CommandError> {
        let world = self.world(name)?;
        store.save(&world.index().regions())?;
        Ok(())
    }

    pub(crate) fn world(&self, name: &str) -> Result<Arc<World>, CommandError> {
        self.worlds
            .get(name)
            .ok_or_else(|| CommandError::UnknownWorld(name.to_owned()))
    }

    /// Run finished background work and, when due, sweep idle movement
    /// sessions. Call once per simulation tick. Returns the number of jobs
    /// run.
    pub fn tick(&mut self, now: Instant) -> usize {
        let jobs = self.queue.drain(TICK_JOB_BUDGET);
        if now.saturating_duration_since(self.last_sweep) >= self.sweep_interval {
            self.movement.sweep(now);
            self.last_sweep = now;
        }
        jobs
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("worlds", &self.worlds)
            .field("tasks", &self.supervisor.len())
            .finish_non_exhaustive()
    }
}
