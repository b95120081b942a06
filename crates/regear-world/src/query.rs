//! Spatial query boundary consumed by the decision engine.
//!
//! The engine never walks world state directly; it asks a
//! [`WorldQuery`] for the items an agent could plausibly walk to.
//! [`ItemStore`] provides a straight-line-distance implementation for
//! tests and embedding hosts without their own spatial index.

use crate::store::{Container, ItemStore};

use regear_types::{AgentId, ItemId};

/// World/spatial collaborator interface.
pub trait WorldQuery {
    /// Items lying in the world within `radius` of the agent, ordered
    /// by ascending distance. Ties break on item ID so scans are
    /// deterministic.
    fn nearby_reachable_items(&self, agent: AgentId, radius: u64) -> Vec<ItemId>;

    /// Whether the agent can currently reach the item at all.
    fn is_reachable(&self, agent: AgentId, item: ItemId) -> bool;
}

impl WorldQuery for ItemStore {
    fn nearby_reachable_items(&self, agent: AgentId, radius: u64) -> Vec<ItemId> {
        let Some(origin) = self.agent_position(agent) else {
            return Vec::new();
        };
        let radius = i128::from(radius);
        let radius_squared = radius.saturating_mul(radius);

        let mut in_range: Vec<(i128, ItemId)> = self
            .world_items()
            .into_iter()
            .filter_map(|id| {
                let position = self.item_position(id)?;
                let distance = origin.distance_squared(position);
                (distance <= radius_squared).then_some((distance, id))
            })
            .collect();
        in_range.sort_unstable();
        in_range.into_iter().map(|(_, id)| id).collect()
    }

    fn is_reachable(&self, agent: AgentId, item: ItemId) -> bool {
        // Straight-line reachability: the item lies in the world and both
        // positions are known. Hosts with pathing plug in their own impl.
        self.container_of(item) == Some(Container::World)
            && self.item_position(item).is_some()
            && self.agent_position(agent).is_some()
    }
}
