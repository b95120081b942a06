//! Exclusive-ownership item store and spatial queries for Regear.
//!
//! This crate owns the physical side of equipment management: which
//! container holds each item (world, primary slot, or carried set),
//! the checked transitions between those containers, and the spatial
//! scan the decision engine uses to find candidates.
//!
//! # Modules
//!
//! - [`error`] -- Error types for item-store operations ([`WorldError`])
//! - [`query`] -- The [`WorldQuery`] collaborator trait
//! - [`store`] -- [`ItemStore`], loadouts, positions, drop cooldowns

pub mod error;
pub mod query;
pub mod store;

// Re-export primary types at crate root for convenience.
pub use error::WorldError;
pub use query::WorldQuery;
pub use store::{Container, ItemStore, Position};
