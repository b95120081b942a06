//! The capacity-authority boundary.
//!
//! An external, independently configured subsystem rules on whether an
//! agent may take an item (slot count, mass budget, owner allow-lists).
//! The engine treats its decision as authoritative and never bypasses
//! or second-guesses it. This module is the only point of contact:
//! [`AuthorityAdapter`] binds one implementation at startup and fails
//! open when none is present -- absence of the authority means no
//! restriction is configured, never an error.

use tracing::{debug, warn};

use regear_types::{AgentId, CapacityVerdict, Item, RejectionClass};
use regear_world::ItemStore;

/// Interface to the external capacity/policy authority.
pub trait CapacityAuthority {
    /// Rule on whether the agent may take the item.
    fn can_accept(&self, item: &Item, agent: AgentId, store: &ItemStore) -> CapacityVerdict;

    /// Informational: the engine dropped an item for the agent.
    fn inform_of_drop(&mut self, agent: AgentId, item: &Item);

    /// Informational: the engine picked up an item for the agent.
    fn inform_of_pickup(&mut self, agent: AgentId, item: &Item);
}

/// Classify a rejection reason into a coarse category.
///
/// Used only to decide whether replace-worst is worth attempting.
/// Filter keywords are checked first so a policy rejection never gets a
/// capacity fallback.
pub fn classify_rejection(reason: &str) -> RejectionClass {
    const FILTER_KEYWORDS: [&str; 6] = ["filter", "allow", "policy", "outfit", "forbid", "banned"];
    const CAPACITY_KEYWORDS: [&str; 7] =
        ["mass", "weight", "capacity", "slot", "full", "heavy", "encumber"];

    let reason = reason.to_lowercase();
    if FILTER_KEYWORDS.iter().any(|kw| reason.contains(kw)) {
        return RejectionClass::Filter;
    }
    if CAPACITY_KEYWORDS.iter().any(|kw| reason.contains(kw)) {
        return RejectionClass::Capacity;
    }
    RejectionClass::Other
}

/// Whether a rejection reason points specifically at the mass budget
/// (as opposed to slot count). Drives the conservative replace-worst
/// heuristic: a mass rejection blocks replacement by a strictly
/// heavier candidate.
pub fn is_mass_related(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    ["mass", "weight", "heavy", "encumber"]
        .iter()
        .any(|kw| reason.contains(kw))
}

/// Adapter holding the authority binding resolved once at startup.
pub struct AuthorityAdapter {
    authority: Option<Box<dyn CapacityAuthority>>,
    warned_missing: bool,
}

impl std::fmt::Debug for AuthorityAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityAdapter")
            .field("bound", &self.authority.is_some())
            .finish_non_exhaustive()
    }
}

impl AuthorityAdapter {
    /// Bind an authority implementation.
    pub const fn bound(authority: Box<dyn CapacityAuthority>) -> Self {
        Self {
            authority: Some(authority),
            warned_missing: false,
        }
    }

    /// No authority could be resolved; every request is granted.
    pub const fn unbound() -> Self {
        Self {
            authority: None,
            warned_missing: false,
        }
    }

    /// Whether an authority implementation is bound.
    pub const fn is_bound(&self) -> bool {
        self.authority.is_some()
    }

    /// Ask the authority whether the agent may take the item. Fails
    /// open with a single warning when no authority is bound.
    pub fn can_accept(&mut self, item: &Item, agent: AgentId, store: &ItemStore) -> CapacityVerdict {
        if let Some(authority) = self.authority.as_ref() {
            return authority.can_accept(item, agent, store);
        }
        if !self.warned_missing {
            self.warned_missing = true;
            warn!("no capacity authority bound; granting all requests");
        }
        CapacityVerdict::accept()
    }

    /// Forward a drop notification, if an authority is bound.
    pub fn inform_of_drop(&mut self, agent: AgentId, item: &Item) {
        if let Some(authority) = self.authority.as_mut() {
            authority.inform_of_drop(agent, item);
        }
    }

    /// Forward a pickup notification, if an authority is bound.
    pub fn inform_of_pickup(&mut self, agent: AgentId, item: &Item) {
        if let Some(authority) = self.authority.as_mut() {
            authority.inform_of_pickup(agent, item);
        }
    }
}

/// Reference authority enforcing a carried-slot count, a mass budget,
/// and an optional type allow-list. Used in tests and by embedding
/// hosts that have no external authority of their own.
#[derive(Debug, Clone)]
pub struct SlotMassAuthority {
    /// Maximum number of items in the carried set.
    pub max_carried_slots: usize,
    /// Maximum total held mass.
    pub mass_budget: rust_decimal::Decimal,
    /// When set, only these item types may be taken.
    pub allowed_types: Option<std::collections::BTreeSet<regear_types::ItemTypeId>>,
}

impl CapacityAuthority for SlotMassAuthority {
    fn can_accept(&self, item: &Item, agent: AgentId, store: &ItemStore) -> CapacityVerdict {
        if let Some(allowed) = &self.allowed_types {
            if !allowed.contains(&item.type_id) {
                return CapacityVerdict::reject(format!(
                    "outfit filter disallows type {}",
                    item.type_id
                ));
            }
        }
        if store.carried_of(agent).len() >= self.max_carried_slots {
            return CapacityVerdict::reject("carried slots full");
        }
        let projected = store.held_mass(agent).checked_add(item.mass);
        if projected.is_some_and(|total| total <= self.mass_budget) {
            CapacityVerdict::accept()
        } else {
            CapacityVerdict::reject(format!(
                "mass budget exceeded: held {} + item {} > budget {}",
                store.held_mass(agent),
                item.mass,
                self.mass_budget
            ))
        }
    }

    fn inform_of_drop(&mut self, agent: AgentId, item: &Item) {
        debug!(%agent, item = %item.id, "drop noted by slot/mass authority");
    }

    fn inform_of_pickup(&mut self, agent: AgentId, item: &Item) {
        debug!(%agent, item = %item.id, "pickup noted by slot/mass authority");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use regear_types::{Capability, ItemId, ItemTypeId, QualityTier};
    use regear_world::Position;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn item_with_mass(name: &str, mass: Decimal) -> Item {
        Item {
            id: ItemId::new(),
            type_id: ItemTypeId::from(name),
            capability: Capability::Ranged,
            quality: QualityTier::default(),
            mass,
            market_value: Decimal::from(10),
            damage_per_hit: Decimal::from(5),
            ticks_per_attack: 50,
            min_wielder_size: Decimal::ONE,
        }
    }

    #[test]
    fn classification_buckets() {
        assert_eq!(classify_rejection("carried slots full"), RejectionClass::Capacity);
        assert_eq!(classify_rejection("Mass budget exceeded"), RejectionClass::Capacity);
        assert_eq!(classify_rejection("outfit filter disallows it"), RejectionClass::Filter);
        assert_eq!(classify_rejection("policy says no"), RejectionClass::Filter);
        assert_eq!(classify_rejection("mysterious refusal"), RejectionClass::Other);
    }

    #[test]
    fn filter_keywords_win_over_capacity_keywords() {
        // A policy rejection must never earn a replace-worst fallback,
        // even when the reason also mentions capacity words.
        assert_eq!(
            classify_rejection("outfit policy forbids heavy items"),
            RejectionClass::Filter
        );
    }

    #[test]
    fn mass_related_detection() {
        assert!(is_mass_related("mass budget exceeded"));
        assert!(is_mass_related("too heavy"));
        assert!(!is_mass_related("carried slots full"));
    }

    #[test]
    fn unbound_adapter_fails_open() {
        let mut adapter = AuthorityAdapter::unbound();
        let store = ItemStore::new();
        let item = item_with_mass("rifle", Decimal::ONE);

        let verdict = adapter.can_accept(&item, AgentId::new(), &store);
        assert!(verdict.accepted);
        assert!(!adapter.is_bound());
    }

    #[test]
    fn slot_limit_rejected_with_capacity_reason() {
        let mut store = ItemStore::new();
        let agent = AgentId::new();
        let held = item_with_mass("pistol", Decimal::ONE);
        store.spawn_item(held.clone(), Position::default()).unwrap();
        store.pick_up_to_carried(agent, held.id).unwrap();

        let authority = SlotMassAuthority {
            max_carried_slots: 1,
            mass_budget: Decimal::from(100),
            allowed_types: None,
        };
        let verdict = authority.can_accept(&item_with_mass("rifle", Decimal::ONE), agent, &store);
        assert!(!verdict.accepted);
        assert_eq!(classify_rejection(&verdict.reason), RejectionClass::Capacity);
        assert!(!is_mass_related(&verdict.reason));
    }

    #[test]
    fn mass_limit_rejected_with_mass_reason() {
        let mut store = ItemStore::new();
        let agent = AgentId::new();
        let held = item_with_mass("pistol", Decimal::from(8));
        store.spawn_item(held.clone(), Position::default()).unwrap();
        store.pick_up_to_carried(agent, held.id).unwrap();

        let authority = SlotMassAuthority {
            max_carried_slots: 10,
            mass_budget: Decimal::from(10),
            allowed_types: None,
        };
        let verdict = authority.can_accept(&item_with_mass("rifle", Decimal::from(5)), agent, &store);
        assert!(!verdict.accepted);
        assert!(is_mass_related(&verdict.reason));
    }

    #[test]
    fn allow_list_rejected_with_filter_reason() {
        let store = ItemStore::new();
        let mut allowed = BTreeSet::new();
        allowed.insert(ItemTypeId::from("pistol"));
        let authority = SlotMassAuthority {
            max_carried_slots: 10,
            mass_budget: Decimal::from(100),
            allowed_types: Some(allowed),
        };

        let verdict =
            authority.can_accept(&item_with_mass("rifle", Decimal::ONE), AgentId::new(), &store);
        assert!(!verdict.accepted);
        assert_eq!(classify_rejection(&verdict.reason), RejectionClass::Filter);
    }
}
