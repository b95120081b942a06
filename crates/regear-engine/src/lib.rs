//! The Regear upgrade decision and swap engine.
//!
//! Autonomous agents in a tick-driven world continuously evaluate
//! nearby items and replace their equipment when something clearly
//! better is within reach. This crate holds everything above the item
//! store: scoring and its cache, owner pins, failed-search backoff,
//! the capacity-authority boundary, the decision pass, the swap
//! orchestrator, and the tick driver that wires them together.
//!
//! # Modules
//!
//! - [`authority`] -- The [`CapacityAuthority`] boundary and fail-open adapter
//! - [`backoff`] -- [`FailedSearchCache`] with exponential windows
//! - [`config`] -- [`EngineConfig`] loading and validation
//! - [`decision`] -- The per-agent evaluation pass ([`decide`])
//! - [`error`] -- [`EngineError`]
//! - [`notify`] -- The [`UpgradeNotifier`] outbound boundary
//! - [`pins`] -- [`PinnedRegistry`] and its persistence format
//! - [`score`] -- Item scoring and the memoizing [`ScoreCache`]
//! - [`swap`] -- [`SwapOrchestrator`] and the temporary-swap protocol
//! - [`tick`] -- [`UpgradeEngine`], the assembled per-tick driver

pub mod authority;
pub mod backoff;
pub mod config;
pub mod decision;
pub mod error;
pub mod notify;
pub mod pins;
pub mod score;
pub mod swap;
pub mod tick;

// Re-export primary types at crate root for convenience.
pub use authority::{AuthorityAdapter, CapacityAuthority, SlotMassAuthority};
pub use backoff::{BackoffStats, FailedSearchCache};
pub use config::{ConfigError, EngineConfig};
pub use decision::{decide, Decision, DecisionContext};
pub use error::EngineError;
pub use notify::{NullNotifier, UpgradeNotifier};
pub use pins::{PinEntry, PinSnapshot, PinnedRegistry};
pub use score::{raw_score, ScoreCache};
pub use swap::{PendingUpgrade, SwapContext, SwapOrchestrator};
pub use tick::{TickSummary, UpgradeEngine};
