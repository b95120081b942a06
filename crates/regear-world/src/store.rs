//! The item store: exclusive ownership tracking and loadout transitions.
//!
//! Every item is owned by exactly one [`Container`] at any time: the
//! world, an agent's primary slot, or an agent's carried set. All
//! transitions are single methods that update both the container table
//! and the loadout, so no intermediate state is ever observable.
//!
//! # Design Principles
//!
//! - Transitions return `Result` and are checked by every caller; a
//!   failed step must abort the remainder of a swap sequence.
//! - Mass sums use checked [`Decimal`] arithmetic.
//! - Agent removal is an explicit lifecycle hook
//!   ([`ItemStore::on_agent_removed`]), never a polled destroyed-flag.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use regear_types::{AgentId, Item, ItemId, ItemTypeId};

use crate::error::WorldError;

/// A position on the simulation plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: i64,
    /// Vertical coordinate.
    pub y: i64,
}

impl Position {
    /// Create a position from coordinates.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another position, widened to `i128` so the
    /// computation cannot overflow.
    pub fn distance_squared(self, other: Self) -> i128 {
        let dx = i128::from(self.x).wrapping_sub(i128::from(other.x));
        let dy = i128::from(self.y).wrapping_sub(i128::from(other.y));
        dx.wrapping_mul(dx).wrapping_add(dy.wrapping_mul(dy))
    }
}

/// The single owner of an item at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Lying in the world at some position.
    World,
    /// Occupying an agent's primary (in-hand) slot.
    Primary(AgentId),
    /// Sitting in an agent's carried set.
    Carried(AgentId),
}

/// An agent's held items: one optional primary slot plus the carried set.
#[derive(Debug, Clone, Default)]
struct Loadout {
    primary: Option<ItemId>,
    carried: Vec<ItemId>,
}

/// In-memory store of items, their owners, and agent loadouts.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: BTreeMap<ItemId, Item>,
    containers: BTreeMap<ItemId, Container>,
    loadouts: BTreeMap<AgentId, Loadout>,
    item_positions: BTreeMap<ItemId, Position>,
    agent_positions: BTreeMap<AgentId, Position>,
    drop_cooldowns: BTreeMap<ItemId, u64>,
}

impl ItemStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            containers: BTreeMap::new(),
            loadouts: BTreeMap::new(),
            item_positions: BTreeMap::new(),
            agent_positions: BTreeMap::new(),
            drop_cooldowns: BTreeMap::new(),
        }
    }

    /// Spawn an item into the world at the given position.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateItem`] if the ID is already known.
    pub fn spawn_item(&mut self, item: Item, position: Position) -> Result<ItemId, WorldError> {
        let id = item.id;
        if self.items.contains_key(&id) {
            return Err(WorldError::DuplicateItem(id));
        }
        self.items.insert(id, item);
        self.containers.insert(id, Container::World);
        self.item_positions.insert(id, position);
        Ok(id)
    }

    /// Destroy an item, detaching it from any loadout.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ItemNotFound`] if the ID is unknown.
    pub fn remove_item(&mut self, id: ItemId) -> Result<Item, WorldError> {
        let item = self.items.remove(&id).ok_or(WorldError::ItemNotFound(id))?;
        if let Some(container) = self.containers.remove(&id) {
            match container {
                Container::World => {}
                Container::Primary(agent) | Container::Carried(agent) => {
                    self.detach_from_loadout(agent, id);
                }
            }
        }
        self.item_positions.remove(&id);
        self.drop_cooldowns.remove(&id);
        Ok(item)
    }

    /// Look up an item by ID.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Return the container currently owning the item, if it exists.
    pub fn container_of(&self, id: ItemId) -> Option<Container> {
        self.containers.get(&id).copied()
    }

    /// The item in the agent's primary slot, if any.
    pub fn primary_of(&self, agent: AgentId) -> Option<ItemId> {
        self.loadouts.get(&agent).and_then(|l| l.primary)
    }

    /// The agent's carried set, in insertion order.
    pub fn carried_of(&self, agent: AgentId) -> &[ItemId] {
        self.loadouts.get(&agent).map_or(&[], |l| l.carried.as_slice())
    }

    /// All items held by the agent: the primary slot first, then the
    /// carried set.
    pub fn held_items(&self, agent: AgentId) -> Vec<ItemId> {
        let Some(loadout) = self.loadouts.get(&agent) else {
            return Vec::new();
        };
        let mut held = Vec::with_capacity(loadout.carried.len().saturating_add(1));
        if let Some(primary) = loadout.primary {
            held.push(primary);
        }
        held.extend(loadout.carried.iter().copied());
        held
    }

    /// Held items whose type matches `type_id`.
    pub fn holdings_of_type(&self, agent: AgentId, type_id: &ItemTypeId) -> Vec<ItemId> {
        self.held_items(agent)
            .into_iter()
            .filter(|id| self.items.get(id).is_some_and(|item| item.type_id == *type_id))
            .collect()
    }

    /// Number of held items whose type matches `type_id`.
    pub fn count_of_type(&self, agent: AgentId, type_id: &ItemTypeId) -> usize {
        self.holdings_of_type(agent, type_id).len()
    }

    /// Total mass currently held by the agent.
    ///
    /// Items missing from the store are skipped; a checked sum that
    /// overflows saturates at `Decimal::MAX`.
    pub fn held_mass(&self, agent: AgentId) -> Decimal {
        self.held_items(agent)
            .iter()
            .filter_map(|id| self.items.get(id))
            .fold(Decimal::ZERO, |total, item| {
                total.checked_add(item.mass).unwrap_or(Decimal::MAX)
            })
    }

    /// Record an agent's position, used for drop placement and scans.
    pub fn set_agent_position(&mut self, agent: AgentId, position: Position) {
        self.agent_positions.insert(agent, position);
    }

    /// The agent's last recorded position.
    pub fn agent_position(&self, agent: AgentId) -> Option<Position> {
        self.agent_positions.get(&agent).copied()
    }

    /// The position of an item lying in the world.
    pub fn item_position(&self, id: ItemId) -> Option<Position> {
        self.item_positions.get(&id).copied()
    }

    /// Move a world item into the agent's carried set.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ItemNotFound`] for unknown items and
    /// [`WorldError::NotInWorld`] if the item is owned elsewhere.
    pub fn pick_up_to_carried(&mut self, agent: AgentId, id: ItemId) -> Result<(), WorldError> {
        self.ensure_known(id)?;
        if self.container_of(id) != Some(Container::World) {
            return Err(WorldError::NotInWorld(id));
        }
        self.item_positions.remove(&id);
        self.containers.insert(id, Container::Carried(agent));
        self.loadouts.entry(agent).or_default().carried.push(id);
        Ok(())
    }

    /// Equip an item into the agent's primary slot.
    ///
    /// The item may come from the world or from the agent's own carried
    /// set. A previously equipped primary item is displaced into the
    /// carried set as part of the same step -- this is the standard
    /// equip pathway, handling drop-and-pick-up as one operation.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotHeldBy`] if the item belongs to a
    /// different agent, or [`WorldError::ItemNotFound`] if unknown.
    pub fn equip(&mut self, agent: AgentId, id: ItemId) -> Result<(), WorldError> {
        self.ensure_known(id)?;
        match self.container_of(id) {
            Some(Container::World) => {
                self.item_positions.remove(&id);
            }
            Some(Container::Carried(holder)) if holder == agent => {
                self.detach_from_loadout(agent, id);
            }
            Some(Container::Primary(holder)) if holder == agent => {
                // Already equipped.
                return Ok(());
            }
            _ => return Err(WorldError::NotHeldBy { item: id, agent }),
        }

        self.displace_primary_to_carried(agent);
        self.loadouts.entry(agent).or_default().primary = Some(id);
        self.containers.insert(id, Container::Primary(agent));
        Ok(())
    }

    /// Move an item from the agent's carried set into the primary slot,
    /// displacing the current primary (if any) into the carried set.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotCarriedBy`] if the item is not in the
    /// agent's carried set.
    pub fn move_to_primary(&mut self, agent: AgentId, id: ItemId) -> Result<(), WorldError> {
        self.ensure_known(id)?;
        match self.container_of(id) {
            Some(Container::Carried(holder)) if holder == agent => {}
            _ => return Err(WorldError::NotCarriedBy { item: id, agent }),
        }
        self.detach_from_loadout(agent, id);
        self.displace_primary_to_carried(agent);
        self.loadouts.entry(agent).or_default().primary = Some(id);
        self.containers.insert(id, Container::Primary(agent));
        Ok(())
    }

    /// Move the agent's primary item into the carried set, leaving the
    /// primary slot empty.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotPrimaryOf`] if the item does not occupy
    /// the agent's primary slot.
    pub fn move_to_carried(&mut self, agent: AgentId, id: ItemId) -> Result<(), WorldError> {
        self.ensure_known(id)?;
        if self.container_of(id) != Some(Container::Primary(agent)) {
            return Err(WorldError::NotPrimaryOf { item: id, agent });
        }
        let loadout = self.loadouts.entry(agent).or_default();
        loadout.primary = None;
        loadout.carried.push(id);
        self.containers.insert(id, Container::Carried(agent));
        Ok(())
    }

    /// Drop a held item to the world at the agent's position.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotHeldBy`] if the agent does not hold the
    /// item.
    pub fn drop_to_world(&mut self, agent: AgentId, id: ItemId) -> Result<(), WorldError> {
        self.ensure_known(id)?;
        match self.container_of(id) {
            Some(Container::Primary(holder) | Container::Carried(holder)) if holder == agent => {}
            _ => return Err(WorldError::NotHeldBy { item: id, agent }),
        }
        self.detach_from_loadout(agent, id);
        self.containers.insert(id, Container::World);
        let position = self.agent_position(agent).unwrap_or_default();
        self.item_positions.insert(id, position);
        Ok(())
    }

    /// Flag a freshly dropped item so it is not immediately re-evaluated
    /// as a pick-up candidate.
    pub fn flag_drop_cooldown(&mut self, id: ItemId, until_tick: u64) {
        self.drop_cooldowns.insert(id, until_tick);
    }

    /// Whether the item is still inside its re-pickup cooldown window.
    pub fn is_on_drop_cooldown(&self, id: ItemId, now: u64) -> bool {
        self.drop_cooldowns.get(&id).is_some_and(|until| now < *until)
    }

    /// Remove expired drop-cooldown flags. Called on the coarse cleanup
    /// cadence, not every tick.
    pub fn purge_expired_cooldowns(&mut self, now: u64) {
        self.drop_cooldowns.retain(|_, until| now < *until);
    }

    /// Lifecycle hook: the world collaborator destroyed an agent.
    ///
    /// All held items are dropped at the agent's last position; the
    /// loadout and position records are discarded.
    pub fn on_agent_removed(&mut self, agent: AgentId) {
        for id in self.held_items(agent) {
            if let Err(err) = self.drop_to_world(agent, id) {
                warn!(%agent, %id, %err, "failed to drop item of removed agent");
            }
        }
        self.loadouts.remove(&agent);
        self.agent_positions.remove(&agent);
    }

    /// All item IDs currently lying in the world.
    pub fn world_items(&self) -> Vec<ItemId> {
        self.containers
            .iter()
            .filter(|(_, container)| **container == Container::World)
            .map(|(id, _)| *id)
            .collect()
    }

    fn ensure_known(&self, id: ItemId) -> Result<(), WorldError> {
        if self.items.contains_key(&id) {
            Ok(())
        } else {
            Err(WorldError::ItemNotFound(id))
        }
    }

    fn displace_primary_to_carried(&mut self, agent: AgentId) {
        let displaced = self.loadouts.entry(agent).or_default().primary.take();
        if let Some(displaced) = displaced {
            self.loadouts.entry(agent).or_default().carried.push(displaced);
            self.containers.insert(displaced, Container::Carried(agent));
        }
    }

    fn detach_from_loadout(&mut self, agent: AgentId, id: ItemId) {
        if let Some(loadout) = self.loadouts.get_mut(&agent) {
            if loadout.primary == Some(id) {
                loadout.primary = None;
            }
            loadout.carried.retain(|held| *held != id);
        }
    }
}
