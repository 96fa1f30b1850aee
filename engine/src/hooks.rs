//! Pre-commit hooks.
//!
//! Other plugins get a chance to veto region changes before they land. A
//! hook returns a [`HookOutcome`]; the engine turns a veto into
//! [`CommandError::Vetoed`](crate::CommandError::Vetoed).

use std::fmt;

use bulwark_core::Region;
use bulwark_types::{Actor, RegionId};

/// Why a region is being created or changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    Claim,
    Define,
    Redefine,
}

impl fmt::Display for ChangeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeCause::Claim => "claim",
            ChangeCause::Define => "definition",
            ChangeCause::Redefine => "redefinition",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    pub proceed: bool,
    pub cancelled_by: Option<String>,
}

impl HookOutcome {
    #[must_use]
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            cancelled_by: None,
        }
    }

    #[must_use]
    pub fn cancel(by: impl Into<String>) -> Self {
        Self {
            proceed: false,
            cancelled_by: Some(by.into()),
        }
    }
}

/// A change about to be committed.
#[derive(Debug, Clone, Copy)]
pub struct PendingChange<'a> {
    /// The region as it will be after the change.
    pub region: &'a Region,
    pub cause: ChangeCause,
    /// `None` for the console.
    pub actor: Option<&'a Actor>,
}

pub trait RegionHooks: Send + Sync {
    /// Runs before any claim work, with only the requested id.
    fn before_claim(&self, _actor: &Actor, _region: &RegionId) -> HookOutcome {
        HookOutcome::proceed()
    }

    /// Runs right before a claim, definition or redefinition is committed.
    fn before_commit(&self, _change: &PendingChange<'_>) -> HookOutcome {
        HookOutcome::proceed()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl RegionHooks for NoHooks {}
