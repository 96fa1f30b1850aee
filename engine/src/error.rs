use bulwark_core::{RegionError, StoreError};
use bulwark_identity::{MutationError, ResolveError};
use bulwark_types::RegionIdError;
use thiserror::Error;

use crate::hooks::ChangeCause;

/// Failures of region commands. The `Display` text is what the sender sees.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No world named '{0}' is loaded.")]
    UnknownWorld(String),
    #[error("Invalid region id: {0}")]
    InvalidId(#[from] RegionIdError),
    #[error("{0}")]
    Region(#[from] RegionError),
    #[error("You don't have permission to {action}.")]
    PermissionDenied { action: &'static str },
    #[error("Only players can {action}.")]
    PlayerOnly { action: &'static str },
    #[error("This region has already been claimed.")]
    AlreadyClaimed,
    #[error("You cannot own more than {limit} regions.")]
    QuotaExceeded { limit: usize },
    #[error("The region {cause} was cancelled by {by}.")]
    Vetoed { cause: ChangeCause, by: String },
    #[error("{0}")]
    MissingTargets(&'static str),
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("Region storage failed: {0}")]
    Store(#[from] StoreError),
}

impl From<MutationError> for CommandError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::Region(err) => CommandError::Region(err),
        }
    }
}
