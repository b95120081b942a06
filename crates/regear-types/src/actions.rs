//! Action and verdict types exchanged between the decision engine,
//! the swap orchestrator, and the capacity authority.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, ItemId};

/// Per-tick description of an agent, supplied by the host each
/// scheduling signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// The agent's stable identity.
    pub id: AgentId,

    /// Scoring bias: `true` favors melee items, `false` favors ranged.
    pub prefer_melee: bool,

    /// Body size, compared against each item's minimum wielder size.
    pub body_size: Decimal,

    /// Whether the agent is under direct player control. Player
    /// controlled agents are unavailable for autonomous equipment
    /// changes, and any in-flight upgrade is cancelled.
    pub player_controlled: bool,
}

/// A physical state transition chosen by the decision engine and
/// executed by the swap orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeAction {
    /// Pick up an item of a type the agent does not hold, into the
    /// carried set.
    PickUp {
        /// The item to pick up.
        item: ItemId,
    },

    /// Replace a held same-type item that occupies the primary slot.
    /// The standard equip pathway handles drop-and-pick-up as one step.
    EquipUpgrade {
        /// The currently held instance being replaced.
        old: ItemId,
        /// The better-scoring candidate.
        new: ItemId,
    },

    /// Replace a held same-type item that sits in the carried set.
    /// Requires the temporary-swap protocol because the equip pathway
    /// only operates on the primary slot.
    SwapThenEquip {
        /// The currently held instance being replaced.
        held: ItemId,
        /// The better-scoring candidate.
        new: ItemId,
    },

    /// Drop the worst-scoring unpinned held item to free capacity,
    /// then pick up the candidate.
    ReplaceWorst {
        /// The worst-scoring held item to drop.
        drop: ItemId,
        /// The candidate to pick up once capacity is freed.
        pick_up: ItemId,
    },
}

/// Accept/reject decision from the capacity authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityVerdict {
    /// Whether the item may be taken.
    pub accepted: bool,

    /// Human-readable reason, meaningful only when rejected.
    pub reason: String,
}

impl CapacityVerdict {
    /// An accepting verdict.
    pub const fn accept() -> Self {
        Self {
            accepted: true,
            reason: String::new(),
        }
    }

    /// A rejecting verdict with the given reason.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

/// Coarse classification of a rejection reason.
///
/// Used only to decide whether a replace-worst fallback is worth
/// attempting -- never to override the original rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionClass {
    /// Slot-count or mass-budget related; freeing capacity may help.
    Capacity,
    /// Owner policy or allow-list related; no fallback applies.
    Filter,
    /// Anything else.
    Other,
}
