//! Player identity resolution for bulwark.
//!
//! Membership commands name players by name or identifier. This crate turns
//! those tokens into a [`Domain`](bulwark_types::Domain) on a background
//! task ([`IdentityResolver`]), then lets the caller apply the result to a
//! region on the simulation thread ([`DomainMutation`], [`SyncQueue`]).

#![allow(clippy::missing_errors_doc)]

mod error;
mod mutation;
mod profile;
mod queue;
mod resolver;

pub use error::{MutationError, ProfileError, ResolveError};
pub use mutation::{DomainMutation, DomainTarget, MutationFut, ResolvedBatch};
pub use profile::{Profile, ProfileFut, ProfileService, StaticProfileService};
pub use queue::{SyncHandle, SyncQueue};
pub use resolver::{CancelHandle, IdentityResolver, ResolutionPolicy, ResolveTask};
