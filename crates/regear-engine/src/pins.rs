//! The pinned registry: owner-designated constraints that block
//! automatic type replacement.
//!
//! A pin relates an agent to an item *type*, optionally narrowed to a
//! specific held instance. A specific-item pin always implies a type
//! pin. When a pinned instance is replaced by a same-type upgrade, the
//! pin migrates atomically to the new instance -- a pin must never
//! dangle on a destroyed item, and never refer to old and new at once.
//!
//! Persistence serializes type identifiers only (instance IDs are not
//! stable across sessions). The loader tolerates the legacy keyed-map
//! format, migrating what it can and discarding corrupt nodes without
//! aborting the load.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use regear_types::{AgentId, Item, ItemId, ItemTypeId};

/// Tracks which item types and instances each agent's owner has pinned.
#[derive(Debug, Default)]
pub struct PinnedRegistry {
    type_pins: BTreeMap<AgentId, BTreeSet<ItemTypeId>>,
    item_pins: BTreeMap<AgentId, BTreeMap<ItemId, ItemTypeId>>,
}

impl PinnedRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            type_pins: BTreeMap::new(),
            item_pins: BTreeMap::new(),
        }
    }

    /// Pin an item type for an agent, blocking type replacement.
    pub fn pin_type(&mut self, agent: AgentId, type_id: ItemTypeId) {
        self.type_pins.entry(agent).or_default().insert(type_id);
    }

    /// Pin a specific held instance. Also pins its type, maintaining the
    /// invariant that a specific pin implies a type pin.
    pub fn pin_item(&mut self, agent: AgentId, item: &Item) {
        self.type_pins
            .entry(agent)
            .or_default()
            .insert(item.type_id.clone());
        self.item_pins
            .entry(agent)
            .or_default()
            .insert(item.id, item.type_id.clone());
    }

    /// Remove a type pin and any specific-item pins of that type.
    pub fn unpin_type(&mut self, agent: AgentId, type_id: &ItemTypeId) {
        if let Some(types) = self.type_pins.get_mut(&agent) {
            types.remove(type_id);
        }
        if let Some(items) = self.item_pins.get_mut(&agent) {
            items.retain(|_, pinned_type| pinned_type != type_id);
        }
    }

    /// Whether the agent has pinned the given item type.
    pub fn is_type_pinned(&self, agent: AgentId, type_id: &ItemTypeId) -> bool {
        self.type_pins
            .get(&agent)
            .is_some_and(|types| types.contains(type_id))
    }

    /// Whether the agent has pinned this specific item instance.
    pub fn is_item_pinned(&self, agent: AgentId, item: ItemId) -> bool {
        self.item_pins
            .get(&agent)
            .is_some_and(|items| items.contains_key(&item))
    }

    /// Move a pin from a replaced instance to its same-type upgrade.
    ///
    /// Valid only when old and new share a type; a mismatched call is a
    /// warn-logged no-op (data inconsistency is self-healed, never
    /// raised). After a successful migration the pin refers to the new
    /// instance only.
    pub fn migrate_pin(&mut self, agent: AgentId, old: &Item, new: &Item) {
        if old.type_id != new.type_id {
            warn!(
                %agent,
                old_type = %old.type_id,
                new_type = %new.type_id,
                "pin migration across item types requested; ignoring"
            );
            return;
        }
        let Some(items) = self.item_pins.get_mut(&agent) else {
            return;
        };
        if items.remove(&old.id).is_some() {
            items.insert(new.id, new.type_id.clone());
        }
    }

    /// Lifecycle hook: the world collaborator destroyed an agent.
    pub fn on_agent_removed(&mut self, agent: AgentId) {
        self.type_pins.remove(&agent);
        self.item_pins.remove(&agent);
    }

    /// Snapshot the registry for persistence. Only type pins survive a
    /// session boundary; instance pins are dropped deliberately.
    pub fn snapshot(&self) -> PinSnapshot {
        let entries = self
            .type_pins
            .iter()
            .flat_map(|(agent, types)| {
                types.iter().map(|type_id| PinEntry {
                    agent: *agent,
                    item_type: type_id.clone(),
                })
            })
            .collect();
        PinSnapshot { pins: entries }
    }

    /// Replace the registry's type pins from a snapshot. Instance pins
    /// start empty after a restore.
    pub fn restore(&mut self, snapshot: &PinSnapshot) {
        self.type_pins.clear();
        self.item_pins.clear();
        for entry in &snapshot.pins {
            self.pin_type(entry.agent, entry.item_type.clone());
        }
    }
}

/// One persisted pin: an agent and a pinned item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinEntry {
    /// The agent whose owner pinned the type.
    pub agent: AgentId,
    /// The pinned item type.
    pub item_type: ItemTypeId,
}

/// Serializable snapshot of the pinned registry (list-pair format).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSnapshot {
    /// All persisted pins.
    pub pins: Vec<PinEntry>,
}

impl PinSnapshot {
    /// Parse a snapshot from a JSON value, tolerating legacy formats.
    ///
    /// The current format is `{"pins": [{"agent": ..., "item_type": ...}]}`.
    /// The legacy format is a keyed map `{"<agent-uuid>": ["type", ...]}`.
    /// Unrecognized or corrupt nodes are consumed and discarded with a
    /// warning; this function never fails, so a damaged save cannot
    /// abort the host's load.
    pub fn from_value(value: &serde_json::Value) -> Self {
        if let Some(pins) = value.get("pins") {
            return Self::from_current_format(pins);
        }
        if let Some(map) = value.as_object() {
            return Self::from_legacy_format(map);
        }
        if !value.is_null() {
            warn!("pin snapshot root is neither current nor legacy format; discarding");
        }
        Self::default()
    }

    /// Serialize to a JSON value in the current list-pair format.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn from_current_format(pins: &serde_json::Value) -> Self {
        let Some(entries) = pins.as_array() else {
            warn!("pin snapshot 'pins' node is not a list; discarding");
            return Self::default();
        };
        let pins = entries
            .iter()
            .filter_map(|entry| {
                let parsed: Option<PinEntry> = serde_json::from_value(entry.clone()).ok();
                if parsed.is_none() {
                    warn!("discarding corrupt pin entry: {entry}");
                }
                parsed
            })
            .collect();
        Self { pins }
    }

    fn from_legacy_format(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut pins = Vec::new();
        for (key, node) in map {
            let Ok(agent_uuid) = key.parse::<Uuid>() else {
                warn!(key, "discarding legacy pin node with unparseable agent key");
                continue;
            };
            let agent = AgentId::from(agent_uuid);
            let Some(types) = node.as_array() else {
                warn!(key, "discarding legacy pin node whose value is not a list");
                continue;
            };
            for type_node in types {
                match type_node.as_str() {
                    Some(name) => pins.push(PinEntry {
                        agent,
                        item_type: ItemTypeId::from(name),
                    }),
                    None => warn!(key, "discarding non-string legacy pin type"),
                }
            }
        }
        Self { pins }
    }
}
