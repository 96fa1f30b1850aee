use std::path::PathBuf;

use bulwark_types::{AttributeError, RegionId};
use thiserror::Error;

/// Failures of region index mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("a region named '{0}' already exists")]
    DuplicateId(RegionId),
    #[error("making '{parent}' the parent of '{child}' would create a cycle")]
    CyclicParent { child: RegionId, parent: RegionId },
    #[error("no region named '{0}'")]
    NotFound(RegionId),
    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

/// Failures loading or saving a region set.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read regions from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write regions to {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed region file {path:?}: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("region file {path:?} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },
    #[error("region file {path:?} is inconsistent: {source}")]
    Invalid { path: PathBuf, source: RegionError },
}
