//! Region commands: membership edits, definition, redefinition and claims.
//!
//! Membership commands resolve names off-thread. They validate and check
//! permissions synchronously, hand the name lookup to the
//! [`IdentityResolver`](bulwark_identity::IdentityResolver), and apply the
//! resulting batch from [`Engine::tick`]. Replies go to the sender's
//! [`MessageSink`](crate::MessageSink) either way.
//!
//! Buying an unclaimed region is checked twice: once up front and again
//! when the owners are applied, since another buyer may have claimed it or
//! the buyer may have reached their quota in between.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bulwark_core::{DomainRole, Region, RegionError, RegionIndex};
use bulwark_identity::{CancelHandle, DomainTarget, ResolutionPolicy, ResolvedBatch};
use bulwark_types::{Actor, AttributeKey, AttributeValue, Bounds, Domain, RegionId};

use crate::error::CommandError;
use crate::hooks::{ChangeCause, HookOutcome, PendingChange, RegionHooks};
use crate::permissions::{PermissionModel, QuotaPolicy};
use crate::source::CommandSource;
use crate::supervisor::TaskGuard;
use crate::world::World;
use crate::Engine;

/// Sent when a resolution takes longer than the configured notice delay.
pub const WAIT_NOTICE: &str = "(Please wait... resolving players...)";

/// Who a membership command targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Names, identifiers and `g:` groups.
    Tokens(Vec<String>),
    /// Everyone in the domain. Only valid for removals.
    All,
}

#[derive(Debug, Clone)]
pub struct MembershipArgs {
    pub world: String,
    pub region: String,
    /// Defaults to [`ResolutionPolicy::UuidAndName`].
    pub policy: Option<ResolutionPolicy>,
    pub targets: Targets,
}

impl MembershipArgs {
    #[must_use]
    pub fn new(world: impl Into<String>, region: impl Into<String>, targets: Targets) -> Self {
        Self {
            world: world.into(),
            region: region.into(),
            policy: None,
            targets,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// What a command left behind.
#[derive(Debug)]
pub enum CommandStatus {
    /// Finished; the sender already got the reply.
    Completed,
    /// Waiting on name resolution. Cancel if the sender goes away.
    Pending(CancelHandle),
}

impl CommandStatus {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, CommandStatus::Pending(_))
    }
}

/// Log a synchronous command failure and tell the sender.
pub fn report_failure(source: &CommandSource, err: &CommandError) {
    tracing::warn!(sender = %source.owner_name(), error = %err, "Region command rejected");
    source.send(&err.to_string());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MembershipOp {
    AddMembers,
    AddOwners,
    RemoveMembers,
    RemoveOwners,
}

impl MembershipOp {
    fn role(self) -> DomainRole {
        match self {
            MembershipOp::AddMembers | MembershipOp::RemoveMembers => DomainRole::Members,
            MembershipOp::AddOwners | MembershipOp::RemoveOwners => DomainRole::Owners,
        }
    }

    fn is_addition(self) -> bool {
        matches!(self, MembershipOp::AddMembers | MembershipOp::AddOwners)
    }

    fn permitted(self, model: &dyn PermissionModel, actor: &Actor, region: &Region) -> bool {
        match self {
            MembershipOp::AddMembers => model.may_add_members(actor, region),
            MembershipOp::AddOwners => model.may_add_owners(actor, region),
            MembershipOp::RemoveMembers => model.may_remove_members(actor, region),
            MembershipOp::RemoveOwners => model.may_remove_owners(actor, region),
        }
    }

    fn denied_action(self) -> &'static str {
        match self {
            MembershipOp::AddMembers => "add members to this region",
            MembershipOp::AddOwners => "add owners to this region",
            MembershipOp::RemoveMembers => "remove members from this region",
            MembershipOp::RemoveOwners => "remove owners from this region",
        }
    }

    fn missing_targets(self) -> &'static str {
        if self.is_addition() {
            "List some names to add."
        } else {
            "List some names to remove, or use -a to remove all."
        }
    }

    fn task_description(self, region: &RegionId) -> String {
        let role = self.role();
        if self.is_addition() {
            format!("Adding {role} to region '{region}'")
        } else {
            format!("Removing {role} from region '{region}'")
        }
    }

    fn success(self, region: &RegionId, world: &str) -> String {
        let role = self.role();
        if self.is_addition() {
            format!("Region '{region}' in world '{world}' updated with new {role}.")
        } else {
            format!("Region '{region}' in world '{world}' updated with {role} removed.")
        }
    }

    fn failure(self) -> String {
        let role = self.role();
        if self.is_addition() {
            format!("Failed to add new {role}")
        } else {
            format!("Failed to remove {role}")
        }
    }
}

/// Reply state shared by a pending command's continuation and its wait
/// notice.
struct Reply {
    source: CommandSource,
    description: String,
    success: String,
    failure: String,
    done: Arc<AtomicBool>,
    _task: TaskGuard,
}

impl Reply {
    fn finish(self, outcome: Result<(), CommandError>) {
        self.done.store(true, Ordering::SeqCst);
        match outcome {
            Ok(()) => {
                tracing::info!(task = %self.description, "Region command finished");
                self.source.send(&self.success);
            }
            Err(err) => {
                tracing::warn!(task = %self.description, error = %err, "Region command failed");
                self.source.send(&format!("{}: {err}", self.failure));
            }
        }
    }
}

fn vet(outcome: HookOutcome, cause: ChangeCause) -> Result<(), CommandError> {
    if outcome.proceed {
        return Ok(());
    }
    let by = outcome
        .cancelled_by
        .unwrap_or_else(|| "another plugin".to_owned());
    tracing::info!(%cause, %by, "Region change vetoed");
    Err(CommandError::Vetoed { cause, by })
}

fn is_unclaimed(region: &Region) -> bool {
    let buyable = region
        .flag(AttributeKey::Buyable)
        .and_then(|setting| setting.value.as_ref())
        .and_then(AttributeValue::as_bool)
        .unwrap_or(false);
    buyable && region.owners().is_empty()
}

fn check_quota(
    permissions: &dyn PermissionModel,
    quota: &dyn QuotaPolicy,
    world: &str,
    index: &RegionIndex,
    actor: &Actor,
) -> Result<(), CommandError> {
    if permissions.has_unlimited_regions(actor) {
        return Ok(());
    }
    let Some(limit) = quota.max_region_count(world, actor) else {
        return Ok(());
    };
    let owned = index.count_owned_by(actor.principal());
    if owned >= limit {
        tracing::debug!(actor = %actor.principal(), owned, limit, "Region quota reached");
        return Err(CommandError::QuotaExceeded { limit });
    }
    Ok(())
}

/// Buy-claim checks repeated when the resolved owners are applied.
struct PurchaseGate {
    permissions: Arc<dyn PermissionModel>,
    quota: Arc<dyn QuotaPolicy>,
    hooks: Arc<dyn RegionHooks>,
    world: String,
}

impl PurchaseGate {
    fn recheck(
        &self,
        target: &DomainTarget,
        actor: Option<&Actor>,
        batch: &ResolvedBatch,
    ) -> Result<(), CommandError> {
        let current = target
            .index
            .get(&target.region)
            .ok_or_else(|| RegionError::NotFound(target.region.clone()))?;
        if !is_unclaimed(&current) {
            return Err(CommandError::AlreadyClaimed);
        }
        if let Some(actor) = actor {
            check_quota(
                self.permissions.as_ref(),
                self.quota.as_ref(),
                &self.world,
                &target.index,
                actor,
            )?;
            if !self.permissions.may_claim_unclaimed(actor, &current) {
                return Err(CommandError::PermissionDenied {
                    action: "claim this region",
                });
            }
        }

        // commit check on the region as it would look with the new owners
        let mut claimed = (*current).clone();
        claimed.owners_mut().add_all(batch.domain());
        vet(
            self.hooks.before_commit(&PendingChange {
                region: &claimed,
                cause: ChangeCause::Claim,
                actor,
            }),
            ChangeCause::Claim,
        )
    }
}

impl Engine {
    pub fn add_members(
        &self,
        source: &CommandSource,
        args: MembershipArgs,
    ) -> Result<CommandStatus, CommandError> {
        self.run_membership(MembershipOp::AddMembers, source, args)
    }

    /// Add owners. A player adding owners to a buyable region nobody owns
    /// is buying it: quota, claim permission and claim hooks apply instead
    /// of the usual owner check.
    pub fn add_owners(
        &self,
        source: &CommandSource,
        args: MembershipArgs,
    ) -> Result<CommandStatus, CommandError> {
        self.run_membership(MembershipOp::AddOwners, source, args)
    }

    pub fn remove_members(
        &self,
        source: &CommandSource,
        args: MembershipArgs,
    ) -> Result<CommandStatus, CommandError> {
        self.run_membership(MembershipOp::RemoveMembers, source, args)
    }

    pub fn remove_owners(
        &self,
        source: &CommandSource,
        args: MembershipArgs,
    ) -> Result<CommandStatus, CommandError> {
        self.run_membership(MembershipOp::RemoveOwners, source, args)
    }

    fn run_membership(
        &self,
        op: MembershipOp,
        source: &CommandSource,
        args: MembershipArgs,
    ) -> Result<CommandStatus, CommandError> {
        let world = self.world(&args.world)?;
        let requested = RegionId::new(args.region)?;
        let region = world
            .index()
            .get(&requested)
            .ok_or(RegionError::NotFound(requested))?;
        let id = region.id().clone();

        let purchase = op == MembershipOp::AddOwners && is_unclaimed(&region);
        if let Some(actor) = &source.actor {
            if purchase {
                self.check_quota(&world, actor)?;
                if !self.permissions.may_claim_unclaimed(actor, &region) {
                    return Err(CommandError::PermissionDenied {
                        action: "claim this region",
                    });
                }
                vet(self.hooks.before_claim(actor, &id), ChangeCause::Claim)?;
            } else if !op.permitted(self.permissions.as_ref(), actor, &region) {
                return Err(CommandError::PermissionDenied {
                    action: op.denied_action(),
                });
            }
        }

        let tokens = match args.targets {
            Targets::All if op.is_addition() => {
                return Err(CommandError::MissingTargets(op.missing_targets()));
            }
            Targets::All => {
                let removed = world
                    .index()
                    .update_domain(&id, op.role(), |domain| {
                        let size = domain.size();
                        domain.clear();
                        size
                    })?;
                tracing::info!(world = %world.name(), region = %id, role = %op.role(), removed, "Domain cleared");
                source.send(&op.success(&id, world.name()));
                return Ok(CommandStatus::Completed);
            }
            Targets::Tokens(tokens) if tokens.is_empty() => {
                return Err(CommandError::MissingTargets(op.missing_targets()));
            }
            Targets::Tokens(tokens) => tokens,
        };

        let policy = args.policy.unwrap_or_default();
        let description = op.task_description(&id);
        let reply = Reply {
            source: source.clone(),
            _task: self.supervisor.register(description.clone(), source.owner_name()),
            description,
            success: op.success(&id, world.name()),
            failure: op.failure(),
            done: Arc::new(AtomicBool::new(false)),
        };
        self.schedule_wait_notice(&reply);

        let target = DomainTarget::new(Arc::clone(world.index()), id, op.role());
        let gate = purchase.then(|| PurchaseGate {
            permissions: Arc::clone(&self.permissions),
            quota: Arc::clone(&self.quota),
            hooks: Arc::clone(&self.hooks),
            world: world.name().to_owned(),
        });
        let actor = source.actor.clone();
        tracing::debug!(task = %reply.description, %policy, tokens = tokens.len(), "Resolving targets");

        let cancel = self.resolver.resolve(tokens, policy).on_complete(
            &self.queue.handle(),
            move |result| {
                let outcome = result.map_err(CommandError::from).and_then(|batch| {
                    if let Some(gate) = &gate {
                        gate.recheck(&target, actor.as_ref(), &batch)?;
                    }
                    let mutation = if op.is_addition() {
                        batch.as_addition(target)
                    } else {
                        batch.as_removal(target)
                    };
                    mutation.apply()?;
                    Ok(())
                });
                reply.finish(outcome);
            },
        );
        Ok(CommandStatus::Pending(cancel))
    }

    fn schedule_wait_notice(&self, reply: &Reply) {
        let done = Arc::clone(&reply.done);
        let source = reply.source.clone();
        let queue = self.queue.handle();
        let delay = self.config.resolver.wait_notice();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if done.load(Ordering::SeqCst) {
                return;
            }
            queue.post(move || {
                if !done.load(Ordering::SeqCst) {
                    source.send(WAIT_NOTICE);
                }
            });
        });
    }

    fn check_quota(&self, world: &World, actor: &Actor) -> Result<(), CommandError> {
        check_quota(
            self.permissions.as_ref(),
            self.quota.as_ref(),
            world.name(),
            world.index(),
            actor,
        )
    }

    fn vet_commit(
        &self,
        region: &Region,
        cause: ChangeCause,
        actor: Option<&Actor>,
    ) -> Result<(), CommandError> {
        vet(
            self.hooks.before_commit(&PendingChange {
                region,
                cause,
                actor,
            }),
            cause,
        )
    }

    /// Add a new region to `world`.
    pub fn define_region(
        &self,
        source: &CommandSource,
        world: &str,
        region: Region,
    ) -> Result<(), CommandError> {
        let world = self.world(world)?;
        if let Some(actor) = &source.actor
            && !self.permissions.may_define(actor)
        {
            return Err(CommandError::PermissionDenied {
                action: "define regions",
            });
        }
        if world.index().contains(region.id()) {
            return Err(RegionError::DuplicateId(region.id().clone()).into());
        }
        self.vet_commit(&region, ChangeCause::Define, source.actor.as_ref())?;

        let id = region.id().clone();
        world.index().add(region)?;
        source.send(&format!("Region '{id}' defined in world '{}'.", world.name()));
        Ok(())
    }

    /// Give an existing region new bounds.
    pub fn redefine_region(
        &self,
        source: &CommandSource,
        world: &str,
        region: &str,
        bounds: Bounds,
    ) -> Result<(), CommandError> {
        let world = self.world(world)?;
        let requested = RegionId::new(region)?;
        let current = world
            .index()
            .get(&requested)
            .ok_or(RegionError::NotFound(requested))?;
        if let Some(actor) = &source.actor
            && !self.permissions.may_redefine(actor, &current)
        {
            return Err(CommandError::PermissionDenied {
                action: "redefine this region",
            });
        }

        let mut redefined = (*current).clone();
        redefined.set_bounds(bounds.clone());
        self.vet_commit(&redefined, ChangeCause::Redefine, source.actor.as_ref())?;

        world.index().redefine(current.id(), bounds)?;
        source.send(&format!("Region '{}' updated with new area.", current.id()));
        Ok(())
    }

    /// Define a region owned by the sender. Players only; quotas apply.
    pub fn claim_region(
        &self,
        source: &CommandSource,
        world: &str,
        mut region: Region,
    ) -> Result<(), CommandError> {
        let Some(actor) = &source.actor else {
            return Err(CommandError::PlayerOnly {
                action: "claim regions",
            });
        };
        let world = self.world(world)?;
        if !self.permissions.may_claim(actor) {
            return Err(CommandError::PermissionDenied {
                action: "claim regions",
            });
        }
        if world.index().contains(region.id()) {
            return Err(RegionError::DuplicateId(region.id().clone()).into());
        }
        self.check_quota(&world, actor)?;
        vet(self.hooks.before_claim(actor, region.id()), ChangeCause::Claim)?;

        *region.owners_mut() = Domain::new().with_player(*actor.principal());
        self.vet_commit(&region, ChangeCause::Claim, Some(actor))?;

        let id = region.id().clone();
        world.index().add(region)?;
        source.send(&format!("A new region has been claimed named '{id}'."));
        Ok(())
    }
}
