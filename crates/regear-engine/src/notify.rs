//! Outbound notifications about completed equipment changes.
//!
//! Hosts bind an implementation to surface upgrades to owners or UI;
//! the engine itself only reports, it never waits on the notifier.

use tracing::debug;

use regear_types::{AgentId, Item};

/// Receiver of completed equipment-change events.
pub trait UpgradeNotifier {
    /// The agent picked up an item it held no equivalent of.
    fn picked_up(&mut self, agent: AgentId, item: &Item);

    /// The agent replaced a held item with a better same-type instance.
    fn upgraded(&mut self, agent: AgentId, old: &Item, new: &Item);

    /// The agent dropped its worst item to make room for a better one.
    fn replaced(&mut self, agent: AgentId, dropped: &Item, picked_up: &Item);
}

/// Default notifier that only emits debug logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl UpgradeNotifier for NullNotifier {
    fn picked_up(&mut self, agent: AgentId, item: &Item) {
        debug!(%agent, item = %item.id, item_type = %item.type_id, "picked up");
    }

    fn upgraded(&mut self, agent: AgentId, old: &Item, new: &Item) {
        debug!(%agent, old = %old.id, new = %new.id, item_type = %new.type_id, "upgraded");
    }

    fn replaced(&mut self, agent: AgentId, dropped: &Item, picked_up: &Item) {
        debug!(%agent, dropped = %dropped.id, picked_up = %picked_up.id, "replaced worst");
    }
}
