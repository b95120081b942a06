//! Error types for the `regear-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through
//! the standard [`Result`] type alias. Every item transition is checked;
//! callers must never assume a move succeeded.

use regear_types::{AgentId, ItemId};

/// Errors that can occur during item-store operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// An item instance was not found in the store.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// An item with the same ID was already spawned.
    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),

    /// The item is not lying in the world, so it cannot be picked up.
    #[error("item {0} is not in the world")]
    NotInWorld(ItemId),

    /// The item is not held by the given agent.
    #[error("item {item} is not held by agent {agent}")]
    NotHeldBy {
        /// The item in question.
        item: ItemId,
        /// The agent that was expected to hold it.
        agent: AgentId,
    },

    /// The item is not in the given agent's carried set.
    #[error("item {item} is not in the carried set of agent {agent}")]
    NotCarriedBy {
        /// The item in question.
        item: ItemId,
        /// The agent whose carried set was checked.
        agent: AgentId,
    },

    /// The item does not occupy the given agent's primary slot.
    #[error("item {item} is not the primary item of agent {agent}")]
    NotPrimaryOf {
        /// The item in question.
        item: ItemId,
        /// The agent whose primary slot was checked.
        agent: AgentId,
    },
}
