//! Error types for the `regear-engine` crate.
//!
//! Engine failures are never fatal to the host: a failed step aborts
//! only the current sequence, and the next scheduling signal retries
//! from scratch. The tick driver logs these errors and degrades to
//! skipping the affected agent for the tick.

use regear_types::{AgentId, ItemId};
use regear_world::WorldError;

/// Errors that can occur while executing an upgrade sequence.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A drop or pick-up sub-step failed part-way through a sequence.
    /// The remaining steps were aborted, leaving the best
    /// already-reached state.
    #[error("swap step '{step}' failed for agent {agent} on item {item}: {source}")]
    SwapStepFailed {
        /// The agent whose sequence was aborted.
        agent: AgentId,
        /// The item the failing step operated on.
        item: ItemId,
        /// Which sub-step failed.
        step: &'static str,
        /// The underlying world error.
        source: WorldError,
    },

    /// A temporary swap was requested while another upgrade is already
    /// in flight for the same agent. At most one pending upgrade may
    /// exist per agent.
    #[error("agent {0} already has a pending upgrade")]
    PendingUpgradeExists(AgentId),

    /// An equip completion arrived for an item that does not match the
    /// agent's pending upgrade.
    #[error("agent {agent}: equip completion for {got} does not match pending item {expected}")]
    MismatchedCompletion {
        /// The agent with the pending upgrade.
        agent: AgentId,
        /// The item the pending upgrade is waiting for.
        expected: ItemId,
        /// The item the completion reported.
        got: ItemId,
    },

    /// An item referenced by an action no longer exists in the store.
    #[error("item vanished before the sequence ran: {0}")]
    ItemVanished(ItemId),
}
