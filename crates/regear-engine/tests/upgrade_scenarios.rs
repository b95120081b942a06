//! End-to-end scenarios driving the assembled engine through whole
//! ticks against an in-memory world.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use rust_decimal::Decimal;

use regear_engine::{AuthorityAdapter, EngineConfig, SlotMassAuthority, UpgradeEngine};
use regear_types::{AgentId, AgentProfile, Capability, Item, ItemId, ItemTypeId, QualityTier};
use regear_world::{Container, ItemStore, Position};

fn npc() -> AgentProfile {
    AgentProfile {
        id: AgentId::new(),
        prefer_melee: false,
        body_size: Decimal::from(2),
        player_controlled: false,
    }
}

/// A ranged item at neutral quality whose score equals `damage`
/// (damage * 100 / 100 ticks).
fn scored_item(type_name: &str, damage: i64) -> Item {
    Item {
        id: ItemId::new(),
        type_id: ItemTypeId::from(type_name),
        capability: Capability::Ranged,
        quality: QualityTier::new(2),
        mass: Decimal::from(3),
        market_value: Decimal::from(100),
        damage_per_hit: Decimal::from(damage),
        ticks_per_attack: 100,
        min_wielder_size: Decimal::ONE,
    }
}

fn place_near(world: &mut ItemStore, agent: AgentId, item: Item) -> ItemId {
    world.set_agent_position(agent, Position::default());
    world.spawn_item(item, Position::new(1, 0)).unwrap()
}

#[test]
fn same_type_upgrade_clears_hysteresis_and_migrates_pins() {
    let mut engine = UpgradeEngine::new(EngineConfig::default());
    let mut world = ItemStore::new();
    let agent = npc();

    // Held primary scores 10; the upgrade bar is 11.5.
    let held = place_near(&mut world, agent.id, scored_item("rifle", 10));
    world.pick_up_to_carried(agent.id, held).unwrap();
    world.equip(agent.id, held).unwrap();
    engine.pins_mut().pin_type(agent.id, ItemTypeId::from("rifle"));

    // An 11-scoring candidate is inside the hysteresis band: no action.
    let marginal = place_near(&mut world, agent.id, scored_item("rifle", 11));
    let summary = engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);
    assert_eq!(summary.none_found, 1);
    assert_eq!(world.primary_of(agent.id), Some(held));

    // A 13-scoring candidate clears the bar once the backoff window
    // from the fruitless scan has elapsed.
    let better = place_near(&mut world, agent.id, scored_item("rifle", 13));
    let summary = engine.run_tick(&mut world, std::slice::from_ref(&agent), 40);
    assert_eq!(summary.acted, 1);

    assert_eq!(world.primary_of(agent.id), Some(better));
    assert_eq!(world.container_of(held), Some(Container::World));
    assert!(world.is_on_drop_cooldown(held, 40));
    // The type pin survives the instance replacement.
    assert!(engine.pins().is_type_pinned(agent.id, &ItemTypeId::from("rifle")));
    // The marginal candidate never moved.
    assert_eq!(world.container_of(marginal), Some(Container::World));
    // No duplicate holdings of the upgraded type.
    assert_eq!(world.count_of_type(agent.id, &ItemTypeId::from("rifle")), 1);
}

#[test]
fn capacity_rejection_is_answered_by_replacing_the_worst_item() {
    let authority = AuthorityAdapter::bound(Box::new(SlotMassAuthority {
        max_carried_slots: 1,
        mass_budget: Decimal::from(100),
        allowed_types: None,
    }));
    let mut engine = UpgradeEngine::new(EngineConfig::default()).with_authority(authority);
    let mut world = ItemStore::new();
    let agent = npc();

    // The single carried slot is occupied by a 5-scoring item.
    let worst = place_near(&mut world, agent.id, scored_item("club", 5));
    world.pick_up_to_carried(agent.id, worst).unwrap();

    // A prior fruitless search left a backoff record.
    let summary = engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);
    assert_eq!(summary.none_found, 1);

    // An 8-scoring candidate appears: rejected for capacity, worth more
    // than 1.15x the worst item, so the worst is traded away.
    let candidate = place_near(&mut world, agent.id, scored_item("rifle", 8));
    let summary = engine.run_tick(&mut world, std::slice::from_ref(&agent), 40);
    assert_eq!(summary.acted, 1);

    assert_eq!(world.container_of(worst), Some(Container::World));
    assert!(world.is_on_drop_cooldown(worst, 40));
    assert_eq!(world.container_of(candidate), Some(Container::Carried(agent.id)));
    // The success cleared the agent's backoff record entirely.
    assert!(engine.backoff_report(41).is_empty());
}

#[test]
fn consecutive_failures_double_the_backoff_window() {
    let mut engine = UpgradeEngine::new(EngineConfig::default());
    let mut world = ItemStore::new();
    let agent = npc();
    world.set_agent_position(agent.id, Position::default());

    // First failure opens a 30-tick window.
    let first = engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);
    assert_eq!(first.none_found, 1);
    let blocked = engine.run_tick(&mut world, std::slice::from_ref(&agent), 29);
    assert_eq!(blocked.on_cooldown, 1);

    // Second failure doubles it to 60 ticks.
    let second = engine.run_tick(&mut world, std::slice::from_ref(&agent), 30);
    assert_eq!(second.none_found, 1);

    // A third signal inside the doubled window performs no scan, even
    // with a perfectly good item now in reach.
    place_near(&mut world, agent.id, scored_item("rifle", 20));
    let third = engine.run_tick(&mut world, std::slice::from_ref(&agent), 50);
    assert_eq!(third.on_cooldown, 1);

    // Once the window elapses the item is taken.
    let fourth = engine.run_tick(&mut world, std::slice::from_ref(&agent), 90);
    assert_eq!(fourth.acted, 1);
}

#[test]
fn timed_out_swap_leaves_the_agent_no_worse_off() {
    let mut engine = UpgradeEngine::new(EngineConfig::default());
    let mut world = ItemStore::new();
    let agent = npc();

    // A carried holding triggers the temporary-swap protocol.
    let held = place_near(&mut world, agent.id, scored_item("rifle", 10));
    world.pick_up_to_carried(agent.id, held).unwrap();
    let better = place_near(&mut world, agent.id, scored_item("rifle", 20));

    let start = engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);
    assert_eq!(start.acted, 1);
    assert_eq!(world.primary_of(agent.id), Some(better));

    // The agent is never scheduled again; the confirmation never
    // arrives. The cleanup sweep reclaims the stuck sequence.
    engine.run_tick(&mut world, &[], 1100);

    // The agent keeps exactly one usable item of the type, the new one.
    assert_eq!(world.primary_of(agent.id), Some(better));
    assert_eq!(world.container_of(held), Some(Container::World));
    assert_eq!(world.count_of_type(agent.id, &ItemTypeId::from("rifle")), 1);

    // With the pending record gone, the agent is free to act again.
    let next = engine.run_tick(&mut world, std::slice::from_ref(&agent), 1200);
    assert_eq!(next.pending, 0);
}

#[test]
fn duplicate_types_are_never_accumulated_by_default() {
    let mut engine = UpgradeEngine::new(EngineConfig::default());
    let mut world = ItemStore::new();
    let agent = npc();

    let held = place_near(&mut world, agent.id, scored_item("rifle", 10));
    world.pick_up_to_carried(agent.id, held).unwrap();
    world.equip(agent.id, held).unwrap();

    // Several same-type candidates, each clearing the bar over the
    // previous one. Run enough ticks for each upgrade to settle.
    place_near(&mut world, agent.id, scored_item("rifle", 13));
    place_near(&mut world, agent.id, scored_item("rifle", 17));
    let mut now = 0;
    for _ in 0..20 {
        engine.run_tick(&mut world, std::slice::from_ref(&agent), now);
        now += 100;
    }

    assert_eq!(world.count_of_type(agent.id, &ItemTypeId::from("rifle")), 1);
}
