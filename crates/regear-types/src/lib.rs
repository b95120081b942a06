//! Shared type definitions for the Regear equipment engine.
//!
//! This crate is the single source of truth for the types used across
//! the Regear workspace.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for agent and item identifiers
//! - [`items`] -- Item model: types, quality tiers, capability
//! - [`actions`] -- Upgrade actions, capacity verdicts, agent profiles

pub mod actions;
pub mod ids;
pub mod items;

// Re-export all public types at crate root for convenience.
pub use actions::{AgentProfile, CapacityVerdict, RejectionClass, UpgradeAction};
pub use ids::{AgentId, ItemId};
pub use items::{Capability, Item, ItemTypeId, QualityTier};
