use bulwark_core::RegionError;
use thiserror::Error;

/// Failure reported by a [`ProfileService`](crate::ProfileService).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("profile lookup failed: {message}")]
pub struct ProfileError {
    pub message: String,
}

impl ProfileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// At least one token did not resolve under the policy. Nothing from
    /// the batch is applied.
    #[error("could not resolve: {}", .0.join(", "))]
    UnresolvedTokens(Vec<String>),
    #[error(transparent)]
    Lookup(#[from] ProfileError),
    #[error("resolution was cancelled")]
    Cancelled,
    #[error("identity resolver is shutting down")]
    ShutDown,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error(transparent)]
    Region(#[from] RegionError),
}
