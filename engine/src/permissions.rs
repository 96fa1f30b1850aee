//! Authorization and region quotas.
//!
//! Both are external collaborators: hosts usually back them with their
//! permission plugin. The defaults here only look at region ownership and
//! the config file.

use std::sync::Arc;

use bulwark_config::GuardConfig;
use bulwark_core::Region;
use bulwark_types::Actor;

/// Who may change what. Only consulted for players; the console is always
/// allowed.
pub trait PermissionModel: Send + Sync {
    fn may_add_members(&self, actor: &Actor, region: &Region) -> bool;
    fn may_add_owners(&self, actor: &Actor, region: &Region) -> bool;
    fn may_remove_members(&self, actor: &Actor, region: &Region) -> bool;
    fn may_remove_owners(&self, actor: &Actor, region: &Region) -> bool;
    /// Taking ownership of a buyable region that has no owners.
    fn may_claim_unclaimed(&self, actor: &Actor, region: &Region) -> bool;
    fn may_define(&self, actor: &Actor) -> bool;
    fn may_redefine(&self, actor: &Actor, region: &Region) -> bool;
    fn may_claim(&self, actor: &Actor) -> bool;
    /// Exempt from region quotas.
    fn has_unlimited_regions(&self, actor: &Actor) -> bool;
}

/// Owners manage their regions; everyone may claim and define.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerPermissionModel;

impl OwnerPermissionModel {
    fn owns(actor: &Actor, region: &Region) -> bool {
        region.is_owner(actor.principal(), actor)
    }
}

impl PermissionModel for OwnerPermissionModel {
    fn may_add_members(&self, actor: &Actor, region: &Region) -> bool {
        Self::owns(actor, region)
    }

    fn may_add_owners(&self, actor: &Actor, region: &Region) -> bool {
        Self::owns(actor, region)
    }

    fn may_remove_members(&self, actor: &Actor, region: &Region) -> bool {
        Self::owns(actor, region)
    }

    fn may_remove_owners(&self, actor: &Actor, region: &Region) -> bool {
        Self::owns(actor, region)
    }

    fn may_claim_unclaimed(&self, _actor: &Actor, _region: &Region) -> bool {
        true
    }

    fn may_define(&self, _actor: &Actor) -> bool {
        true
    }

    fn may_redefine(&self, actor: &Actor, region: &Region) -> bool {
        Self::owns(actor, region)
    }

    fn may_claim(&self, _actor: &Actor) -> bool {
        true
    }

    fn has_unlimited_regions(&self, _actor: &Actor) -> bool {
        false
    }
}

/// Per-player region limits.
pub trait QuotaPolicy: Send + Sync {
    /// How many regions `actor` may own in `world`; `None` is unlimited.
    fn max_region_count(&self, world: &str, actor: &Actor) -> Option<usize>;
}

/// Limits from `[regions]` and `[worlds.<name>]`.
#[derive(Debug, Clone)]
pub struct ConfiguredQuota {
    config: Arc<GuardConfig>,
}

impl ConfiguredQuota {
    #[must_use]
    pub fn new(config: Arc<GuardConfig>) -> Self {
        Self { config }
    }
}

impl QuotaPolicy for ConfiguredQuota {
    fn max_region_count(&self, world: &str, actor: &Actor) -> Option<usize> {
        self.config.region_limit(world, actor.groups())
    }
}
