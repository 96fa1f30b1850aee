//! Core domain types for bulwark.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod attribute;
mod domain;
mod geometry;
mod ids;

pub use attribute::{
    AttributeError, AttributeKey, AttributeKind, AttributeValue, FlagSetting, RegionGroup, State,
};
pub use domain::{Actor, Domain, GroupLookup, NoGroups};
pub use geometry::{BlockVector, Bounds, BoundsError, Point2};
pub use ids::{EntityId, GroupId, PrincipalId, RegionId, RegionIdError};
