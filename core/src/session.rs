//! Per-entity movement sessions.
//!
//! Movement events arrive every tick, so the per-entity state the rules need
//! (the last exit toggle) is cached in a [`SessionCache`]. Idle sessions are
//! swept after a fixed window and rebuilt from a fresh query the next time
//! the entity moves.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bulwark_types::{AttributeKey, BlockVector, EntityId, State};
use parking_lot::Mutex;

use crate::applicable::ApplicableSet;
use crate::index::RegionIndex;

/// Idle window after which a session is dropped.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(60);
/// Minimum spacing of access-triggered sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Cached movement state of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementSession {
    entity: EntityId,
    last_toggle: bool,
    denied_edge: bool,
    last_seen: Instant,
}

impl MovementSession {
    fn new(entity: EntityId, now: Instant) -> Self {
        Self {
            entity,
            last_toggle: true,
            denied_edge: false,
            last_seen: now,
        }
    }

    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Last exit value a move was allowed under (`true` = exiting allowed).
    #[must_use]
    pub fn last_toggle(&self) -> bool {
        self.last_toggle
    }

    pub fn set_last_toggle(&mut self, value: bool) {
        self.last_toggle = value;
    }

    /// Whether the current restrictive edge has already produced a denial.
    #[must_use]
    pub fn denied_edge(&self) -> bool {
        self.denied_edge
    }

    pub fn set_denied_edge(&mut self, value: bool) {
        self.denied_edge = value;
    }

    #[must_use]
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// One stateful check in the movement chain.
pub trait MovePredicate: Send + Sync {
    /// Seed session state from the entity's current location.
    fn init(&self, _current: &ApplicableSet, _session: &mut MovementSession) {}

    /// Whether a move into `dest` is allowed.
    fn test(&self, dest: &ApplicableSet, session: &mut MovementSession) -> bool;
}

/// State attribute with deny winning among the top-priority candidates.
///
/// Entity movement has no actor, so only unrestricted values count.
#[must_use]
pub fn state_deny_wins(set: &ApplicableSet, key: AttributeKey) -> Option<State> {
    let candidates = set.candidates(key, None);
    let Some(first) = candidates.first() else {
        return key.default_value().and_then(|value| value.as_state());
    };
    let top = first.priority();
    let denied = candidates
        .iter()
        .take_while(|candidate| candidate.priority() == top)
        .any(|candidate| candidate.value.as_state() == Some(State::Deny));
    if denied {
        Some(State::Deny)
    } else {
        first.value.as_state()
    }
}

/// Disallows moves into regions whose entry attribute resolves to deny.
#[derive(Debug, Clone, Copy)]
pub struct EntryRule {
    key: AttributeKey,
}

impl EntryRule {
    #[must_use]
    pub fn new(key: AttributeKey) -> Self {
        Self { key }
    }
}

impl Default for EntryRule {
    fn default() -> Self {
        Self::new(AttributeKey::MobEntry)
    }
}

impl MovePredicate for EntryRule {
    fn test(&self, dest: &ApplicableSet, _session: &mut MovementSession) -> bool {
        state_deny_wins(dest, self.key) != Some(State::Deny)
    }
}

/// Exit check with hysteresis.
///
/// Only a change towards "exit denied" can disallow a move, and only once
/// per edge: the next identical observation is allowed and becomes the new
/// toggle. The toggle itself only moves on allowed moves.
#[derive(Debug, Clone, Copy)]
pub struct ExitHysteresis {
    key: AttributeKey,
}

impl ExitHysteresis {
    #[must_use]
    pub fn new(key: AttributeKey) -> Self {
        Self { key }
    }

    fn exit_allowed(&self, set: &ApplicableSet) -> bool {
        state_deny_wins(set, self.key) != Some(State::Deny)
    }
}

impl Default for ExitHysteresis {
    fn default() -> Self {
        Self::new(AttributeKey::MobExit)
    }
}

impl MovePredicate for ExitHysteresis {
    fn init(&self, current: &ApplicableSet, session: &mut MovementSession) {
        session.last_toggle = self.exit_allowed(current);
        session.denied_edge = false;
    }

    fn test(&self, dest: &ApplicableSet, session: &mut MovementSession) -> bool {
        let observed = self.exit_allowed(dest);
        if observed == session.last_toggle {
            session.denied_edge = false;
            return true;
        }
        if !observed && !session.denied_edge {
            session.denied_edge = true;
            return false;
        }
        session.last_toggle = observed;
        session.denied_edge = false;
        true
    }
}

struct CacheState {
    sessions: HashMap<EntityId, MovementSession>,
    last_sweep: Instant,
}

/// Movement sessions of one world.
pub struct SessionCache {
    predicates: Vec<Box<dyn MovePredicate>>,
    idle: Duration,
    sweep_interval: Duration,
    state: Mutex<CacheState>,
}

impl SessionCache {
    #[must_use]
    pub fn new(predicates: Vec<Box<dyn MovePredicate>>, idle: Duration, sweep_interval: Duration) -> Self {
        Self {
            predicates,
            idle,
            sweep_interval,
            state: Mutex::new(CacheState {
                sessions: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Entry rule then exit hysteresis, on the mob attributes.
    #[must_use]
    pub fn with_default_rules(idle: Duration, sweep_interval: Duration) -> Self {
        Self::new(
            vec![
                Box::new(EntryRule::default()),
                Box::new(ExitHysteresis::default()),
            ],
            idle,
            sweep_interval,
        )
    }

    /// Run the predicate chain for a move of `entity` from `from` to `to`.
    ///
    /// A missing or expired session is (re)created from a query at `from`.
    /// The first predicate that disallows ends the chain.
    pub fn test_move(
        &self,
        index: &RegionIndex,
        entity: EntityId,
        from: BlockVector,
        to: BlockVector,
        now: Instant,
    ) -> bool {
        let dest = index.query(to);
        let mut state = self.state.lock();
        if now.saturating_duration_since(state.last_sweep) >= self.sweep_interval {
            Self::sweep_locked(&mut state, self.idle, now);
        }
        let session = self.session_entry(&mut state, index, entity, from, now);
        session.last_seen = now;

        let allowed = self
            .predicates
            .iter()
            .all(|predicate| predicate.test(&dest, session));
        if !allowed {
            tracing::debug!(%entity, %to, "Move disallowed");
        }
        allowed
    }

    /// Current session for `entity`, creating it from `at` if needed.
    pub fn get_or_create(
        &self,
        index: &RegionIndex,
        entity: EntityId,
        at: BlockVector,
        now: Instant,
    ) -> MovementSession {
        let mut state = self.state.lock();
        self.session_entry(&mut state, index, entity, at, now).clone()
    }

    fn session_entry<'s>(
        &self,
        state: &'s mut CacheState,
        index: &RegionIndex,
        entity: EntityId,
        at: BlockVector,
        now: Instant,
    ) -> &'s mut MovementSession {
        let stale = state
            .sessions
            .get(&entity)
            .is_some_and(|session| now.saturating_duration_since(session.last_seen) >= self.idle);
        if stale {
            state.sessions.remove(&entity);
        }
        state.sessions.entry(entity).or_insert_with(|| {
            let current = index.query(at);
            let mut session = MovementSession::new(entity, now);
            for predicate in &self.predicates {
                predicate.init(&current, &mut session);
            }
            tracing::debug!(%entity, "Movement session created");
            session
        })
    }

    /// Drop sessions idle for longer than the window. Returns how many.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        Self::sweep_locked(&mut state, self.idle, now)
    }

    fn sweep_locked(state: &mut CacheState, idle: Duration, now: Instant) -> usize {
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, session| now.saturating_duration_since(session.last_seen) < idle);
        state.last_sweep = now;
        let evicted = before - state.sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = state.sessions.len(), "Swept movement sessions");
        }
        evicted
    }

    /// Forget one entity, e.g. when it despawns.
    pub fn evict(&self, entity: EntityId) -> bool {
        self.state.lock().sessions.remove(&entity).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("predicates", &self.predicates.len())
            .field("idle", &self.idle)
            .field("sessions", &self.len())
            .finish()
    }
}
