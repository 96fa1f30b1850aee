//! Region engine for bulwark.
//!
//! Everything in this crate is synchronous and runs on the thread that
//! drives a world: the per-world [`RegionIndex`], attribute resolution over
//! an [`ApplicableSet`], movement sessions and region storage.

#![allow(clippy::missing_errors_doc)]

mod applicable;
mod error;
mod index;
mod region;
pub mod session;
mod store;

pub use applicable::{ApplicableSet, Candidate, Resolved};
pub use error::{RegionError, StoreError};
pub use index::RegionIndex;
pub use region::{DomainRole, Region};
pub use session::{MovePredicate, MovementSession, SessionCache};
pub use store::{JsonRegionStore, RegionStore};
