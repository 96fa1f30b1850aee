//! Applying a resolved batch to a region's domain.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use bulwark_core::{DomainRole, RegionIndex};
use bulwark_types::{Domain, RegionId};

use crate::error::MutationError;

/// Principals and groups a resolution produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedBatch {
    domain: Domain,
}

impl ResolvedBatch {
    #[must_use]
    pub fn new(domain: Domain) -> Self {
        Self { domain }
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[must_use]
    pub fn into_domain(self) -> Domain {
        self.domain
    }

    /// Union the batch into `target` when applied.
    #[must_use]
    pub fn as_addition(self, target: DomainTarget) -> DomainMutation {
        DomainMutation {
            kind: MutationKind::Add,
            delta: self.domain,
            target,
        }
    }

    /// Remove the batch from `target` when applied.
    #[must_use]
    pub fn as_removal(self, target: DomainTarget) -> DomainMutation {
        DomainMutation {
            kind: MutationKind::Remove,
            delta: self.domain,
            target,
        }
    }
}

/// One domain of one region.
#[derive(Debug, Clone)]
pub struct DomainTarget {
    pub index: Arc<RegionIndex>,
    pub region: RegionId,
    pub role: DomainRole,
}

impl DomainTarget {
    #[must_use]
    pub fn new(index: Arc<RegionIndex>, region: RegionId, role: DomainRole) -> Self {
        Self {
            index,
            region,
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationKind {
    Add,
    Remove,
}

/// A pending domain change. Nothing happens until it is applied, and it can
/// only be applied once.
///
/// Apply it on the thread that owns the world, usually from a job posted to
/// the [`SyncQueue`](crate::SyncQueue).
#[derive(Debug)]
#[must_use = "a domain mutation does nothing until applied"]
pub struct DomainMutation {
    kind: MutationKind,
    delta: Domain,
    target: DomainTarget,
}

pub type MutationFut = Pin<Box<dyn Future<Output = Result<Domain, MutationError>> + Send>>;

impl DomainMutation {
    #[must_use]
    pub fn target(&self) -> &DomainTarget {
        &self.target
    }

    #[must_use]
    pub fn delta(&self) -> &Domain {
        &self.delta
    }

    /// Perform the change and return the domain as it now stands.
    pub fn apply(self) -> Result<Domain, MutationError> {
        let Self {
            kind,
            delta,
            target,
        } = self;
        let (changed, domain) = target.index.update_domain(&target.region, target.role, |domain| {
            let changed = match kind {
                MutationKind::Add => domain.add_all(&delta),
                MutationKind::Remove => domain.remove_all_of(&delta),
            };
            (changed, domain.clone())
        })?;
        tracing::debug!(
            world = %target.index.world(),
            region = %target.region,
            role = %target.role,
            ?kind,
            changed,
            "Domain updated"
        );
        Ok(domain)
    }
}

impl IntoFuture for DomainMutation {
    type Output = Result<Domain, MutationError>;
    type IntoFuture = MutationFut;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.apply() })
    }
}
