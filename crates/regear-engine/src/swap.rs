//! The swap orchestrator: turns decisions into world transitions.
//!
//! Every sub-step is checked; a failure aborts the remaining steps and
//! leaves the best already-reached state rather than attempting a
//! speculative rollback. Temporary swaps span multiple ticks: the held
//! item is staged into the primary slot so the standard equip pathway
//! replaces it, and the sequence finishes only when the equip of the
//! new item is confirmed. At most one upgrade may be in flight per
//! agent; stuck ones are reclaimed by a periodic sweep.

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use regear_types::{AgentId, ItemId, UpgradeAction};
use regear_world::{Container, ItemStore, WorldError};

use crate::authority::AuthorityAdapter;
use crate::backoff::FailedSearchCache;
use crate::error::EngineError;
use crate::notify::UpgradeNotifier;
use crate::pins::PinnedRegistry;

/// An upgrade sequence that has started but not yet finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUpgrade {
    /// The held instance being replaced.
    pub old_item: ItemId,
    /// The candidate that must end up equipped.
    pub new_item: ItemId,
    /// The item that occupied the primary slot before staging, restored
    /// on completion. `None` means the new item stays primary.
    pub original_primary: Option<ItemId>,
    /// Tick at which the sequence started, for the stuck sweep.
    pub started_tick: u64,
}

/// Collaborators the orchestrator updates as side effects of a swap.
pub struct SwapContext<'a> {
    /// Pins migrate with same-type replacements.
    pub pins: &'a mut PinnedRegistry,
    /// Successes clear failed-search records.
    pub backoff: &'a FailedSearchCache,
    /// The authority is informed of every pickup and drop.
    pub authority: &'a mut AuthorityAdapter,
    /// Completed changes are reported here.
    pub notifier: &'a mut dyn UpgradeNotifier,
}

/// Executes upgrade actions and tracks in-flight temporary swaps.
#[derive(Debug)]
pub struct SwapOrchestrator {
    pending: BTreeMap<AgentId, PendingUpgrade>,
    drop_cooldown_ticks: u64,
    timeout_ticks: u64,
}

impl SwapOrchestrator {
    /// Create an orchestrator with the given drop-cooldown and
    /// pending-timeout windows (in ticks).
    pub const fn new(drop_cooldown_ticks: u64, timeout_ticks: u64) -> Self {
        Self {
            pending: BTreeMap::new(),
            drop_cooldown_ticks,
            timeout_ticks,
        }
    }

    /// The agent's in-flight upgrade, if any.
    pub fn pending_for(&self, agent: AgentId) -> Option<&PendingUpgrade> {
        self.pending.get(&agent)
    }

    /// Execute one decided action for one agent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SwapStepFailed`] when a sub-step fails
    /// (the sequence is aborted at that point),
    /// [`EngineError::PendingUpgradeExists`] when a temporary swap is
    /// requested while one is already in flight, and
    /// [`EngineError::ItemVanished`] when a referenced item no longer
    /// exists.
    pub fn execute(
        &mut self,
        ctx: &mut SwapContext<'_>,
        world: &mut ItemStore,
        agent: AgentId,
        action: UpgradeAction,
        now: u64,
    ) -> Result<(), EngineError> {
        match action {
            UpgradeAction::PickUp { item } => Self::pick_up(ctx, world, agent, item),
            UpgradeAction::EquipUpgrade { old, new } => {
                self.equip_upgrade(ctx, world, agent, old, new, now)
            }
            UpgradeAction::SwapThenEquip { held, new } => {
                self.swap_then_equip(world, agent, held, new, now)
            }
            UpgradeAction::ReplaceWorst { drop, pick_up } => {
                self.replace_worst(ctx, world, agent, drop, pick_up, now)
            }
        }
    }

    fn pick_up(
        ctx: &mut SwapContext<'_>,
        world: &mut ItemStore,
        agent: AgentId,
        item_id: ItemId,
    ) -> Result<(), EngineError> {
        let item = world
            .item(item_id)
            .cloned()
            .ok_or(EngineError::ItemVanished(item_id))?;
        world
            .pick_up_to_carried(agent, item_id)
            .map_err(|source| step_failed(agent, item_id, "pick_up", source))?;

        ctx.authority.inform_of_pickup(agent, &item);
        ctx.backoff.record_success(agent, item_id);
        ctx.notifier.picked_up(agent, &item);
        info!(%agent, item = %item_id, item_type = %item.type_id, "picked up item");
        Ok(())
    }

    /// Replace a primary-slot item in one pass: the equip pathway
    /// displaces the old item into the carried set, from where it is
    /// dropped.
    fn equip_upgrade(
        &self,
        ctx: &mut SwapContext<'_>,
        world: &mut ItemStore,
        agent: AgentId,
        old_id: ItemId,
        new_id: ItemId,
        now: u64,
    ) -> Result<(), EngineError> {
        let old = world
            .item(old_id)
            .cloned()
            .ok_or(EngineError::ItemVanished(old_id))?;
        let new = world
            .item(new_id)
            .cloned()
            .ok_or(EngineError::ItemVanished(new_id))?;

        world
            .equip(agent, new_id)
            .map_err(|source| step_failed(agent, new_id, "equip_new", source))?;
        world
            .drop_to_world(agent, old_id)
            .map_err(|source| step_failed(agent, old_id, "drop_old", source))?;
        world.flag_drop_cooldown(old_id, now.saturating_add(self.drop_cooldown_ticks));

        ctx.pins.migrate_pin(agent, &old, &new);
        ctx.authority.inform_of_pickup(agent, &new);
        ctx.authority.inform_of_drop(agent, &old);
        ctx.backoff.record_success(agent, new_id);
        ctx.notifier.upgraded(agent, &old, &new);
        info!(%agent, old = %old_id, new = %new_id, item_type = %new.type_id, "upgraded primary item");
        Ok(())
    }

    /// Start a temporary swap: stage the held item into the primary
    /// slot, then equip the new one over it. The sequence stays pending
    /// until the equip is confirmed on a later tick.
    fn swap_then_equip(
        &mut self,
        world: &mut ItemStore,
        agent: AgentId,
        held_id: ItemId,
        new_id: ItemId,
        now: u64,
    ) -> Result<(), EngineError> {
        if self.pending.contains_key(&agent) {
            return Err(EngineError::PendingUpgradeExists(agent));
        }
        if world.item(new_id).is_none() {
            return Err(EngineError::ItemVanished(new_id));
        }

        let original_primary = world.primary_of(agent);
        world
            .move_to_primary(agent, held_id)
            .map_err(|source| step_failed(agent, held_id, "stage_held", source))?;
        if let Err(source) = world.equip(agent, new_id) {
            // Undo the staging so the loadout is as before.
            if let Some(orig) = original_primary {
                if let Err(undo) = world.move_to_primary(agent, orig) {
                    warn!(%agent, item = %orig, %undo, "failed to restore primary after aborted swap");
                }
            }
            return Err(step_failed(agent, new_id, "equip_new", source));
        }

        self.pending.insert(
            agent,
            PendingUpgrade {
                old_item: held_id,
                new_item: new_id,
                original_primary,
                started_tick: now,
            },
        );
        info!(%agent, held = %held_id, new = %new_id, "temporary swap started");
        Ok(())
    }

    fn replace_worst(
        &self,
        ctx: &mut SwapContext<'_>,
        world: &mut ItemStore,
        agent: AgentId,
        drop_id: ItemId,
        pick_up_id: ItemId,
        now: u64,
    ) -> Result<(), EngineError> {
        let dropped = world
            .item(drop_id)
            .cloned()
            .ok_or(EngineError::ItemVanished(drop_id))?;
        let picked = world
            .item(pick_up_id)
            .cloned()
            .ok_or(EngineError::ItemVanished(pick_up_id))?;

        world
            .drop_to_world(agent, drop_id)
            .map_err(|source| step_failed(agent, drop_id, "drop_worst", source))?;
        world.flag_drop_cooldown(drop_id, now.saturating_add(self.drop_cooldown_ticks));
        ctx.authority.inform_of_drop(agent, &dropped);

        if let Err(source) = world.pick_up_to_carried(agent, pick_up_id) {
            // The worst item is already on the ground; nothing to roll
            // back without racing whoever took the candidate.
            error!(%agent, dropped = %drop_id, candidate = %pick_up_id, %source,
                "pick-up failed after freeing capacity");
            return Err(step_failed(agent, pick_up_id, "pick_up_after_drop", source));
        }

        ctx.authority.inform_of_pickup(agent, &picked);
        ctx.backoff.record_success(agent, pick_up_id);
        ctx.notifier.replaced(agent, &dropped, &picked);
        info!(%agent, dropped = %drop_id, picked_up = %pick_up_id, "replaced worst item");
        Ok(())
    }

    /// Finish a temporary swap once the equip of the new item is
    /// confirmed: drop the replaced item, migrate its pin, and restore
    /// the original primary when one existed.
    ///
    /// A partial failure keeps the pending record so the sweep can
    /// finish the job later; the steps are written to be safely
    /// re-runnable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MismatchedCompletion`] when the confirmed
    /// item is not the one the pending upgrade waits for, and
    /// [`EngineError::SwapStepFailed`] when a finishing step fails.
    pub fn on_equip_completed(
        &mut self,
        ctx: &mut SwapContext<'_>,
        world: &mut ItemStore,
        agent: AgentId,
        equipped: ItemId,
        now: u64,
    ) -> Result<(), EngineError> {
        let Some(pending) = self.pending.get(&agent).copied() else {
            return Ok(());
        };
        if equipped != pending.new_item {
            return Err(EngineError::MismatchedCompletion {
                agent,
                expected: pending.new_item,
                got: equipped,
            });
        }

        self.finish_pending(ctx, world, agent, pending, now)?;
        self.pending.remove(&agent);
        Ok(())
    }

    fn finish_pending(
        &self,
        ctx: &mut SwapContext<'_>,
        world: &mut ItemStore,
        agent: AgentId,
        pending: PendingUpgrade,
        now: u64,
    ) -> Result<(), EngineError> {
        let old = world
            .item(pending.old_item)
            .cloned()
            .ok_or(EngineError::ItemVanished(pending.old_item))?;
        let new = world
            .item(pending.new_item)
            .cloned()
            .ok_or(EngineError::ItemVanished(pending.new_item))?;

        if is_held_by(world, pending.old_item, agent) {
            world
                .drop_to_world(agent, pending.old_item)
                .map_err(|source| step_failed(agent, pending.old_item, "drop_old", source))?;
            world.flag_drop_cooldown(
                pending.old_item,
                now.saturating_add(self.drop_cooldown_ticks),
            );
            ctx.authority.inform_of_drop(agent, &old);
        }

        if let Some(orig) = pending.original_primary {
            if world.container_of(orig) == Some(Container::Carried(agent)) {
                world
                    .move_to_carried(agent, pending.new_item)
                    .map_err(|source| step_failed(agent, pending.new_item, "unstage_new", source))?;
                world
                    .move_to_primary(agent, orig)
                    .map_err(|source| step_failed(agent, orig, "restore_primary", source))?;
            }
        }

        ctx.pins.migrate_pin(agent, &old, &new);
        ctx.authority.inform_of_pickup(agent, &new);
        ctx.backoff.record_success(agent, pending.new_item);
        ctx.notifier.upgraded(agent, &old, &new);
        info!(%agent, old = %pending.old_item, new = %pending.new_item, "temporary swap completed");
        Ok(())
    }

    /// Abandon the agent's in-flight upgrade, if any, and drive the
    /// loadout to a coherent state. Used when the agent becomes
    /// unavailable for autonomous action mid-sequence.
    pub fn cancel(
        &mut self,
        ctx: &mut SwapContext<'_>,
        world: &mut ItemStore,
        agent: AgentId,
        now: u64,
    ) -> Option<PendingUpgrade> {
        let pending = self.pending.remove(&agent)?;
        warn!(%agent, new = %pending.new_item, "pending upgrade cancelled");
        self.reclaim(ctx, world, agent, pending, now);
        Some(pending)
    }

    /// Reclaim pending upgrades older than the timeout. Each stuck swap
    /// is driven to its terminal state and the record is discarded
    /// either way, so the agent is free to act again.
    pub fn sweep_stuck(&mut self, ctx: &mut SwapContext<'_>, world: &mut ItemStore, now: u64) {
        let stuck: Vec<(AgentId, PendingUpgrade)> = self
            .pending
            .iter()
            .filter(|(_, pending)| {
                now.saturating_sub(pending.started_tick) >= self.timeout_ticks
            })
            .map(|(agent, pending)| (*agent, *pending))
            .collect();

        for (agent, pending) in stuck {
            warn!(%agent, new = %pending.new_item,
                age = now.saturating_sub(pending.started_tick), "reclaiming stuck pending upgrade");
            self.pending.remove(&agent);
            self.reclaim(ctx, world, agent, pending, now);
        }
    }

    /// Drive an abandoned pending upgrade to its terminal state. A
    /// record only exists once the new item is equipped, so the
    /// coherent end state is the completed one: replaced item dropped
    /// with a cooldown, pin migrated, original primary restored. The
    /// record is already gone; a partial failure here is logged and the
    /// loadout keeps whatever was reached.
    fn reclaim(
        &self,
        ctx: &mut SwapContext<'_>,
        world: &mut ItemStore,
        agent: AgentId,
        pending: PendingUpgrade,
        now: u64,
    ) {
        if let Err(err) = self.finish_pending(ctx, world, agent, pending, now) {
            warn!(%agent, new = %pending.new_item, %err,
                "abandoned upgrade only partially reclaimed");
        }
    }

    /// Lifecycle hook: the world collaborator destroyed an agent.
    pub fn on_agent_removed(&mut self, agent: AgentId) {
        self.pending.remove(&agent);
    }
}

fn is_held_by(world: &ItemStore, item: ItemId, agent: AgentId) -> bool {
    matches!(
        world.container_of(item),
        Some(Container::Primary(holder) | Container::Carried(holder)) if holder == agent
    )
}

const fn step_failed(
    agent: AgentId,
    item: ItemId,
    step: &'static str,
    source: WorldError,
) -> EngineError {
    EngineError::SwapStepFailed {
        agent,
        item,
        step,
        source,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::NullNotifier;
    use regear_types::{Capability, Item, ItemTypeId, QualityTier};
    use regear_world::Position;
    use rust_decimal::Decimal;

    struct Harness {
        pins: PinnedRegistry,
        backoff: FailedSearchCache,
        authority: AuthorityAdapter,
        notifier: NullNotifier,
        swaps: SwapOrchestrator,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                pins: PinnedRegistry::new(),
                backoff: FailedSearchCache::new(30, 36_000, 1000),
                authority: AuthorityAdapter::unbound(),
                notifier: NullNotifier,
                swaps: SwapOrchestrator::new(300, 600),
            }
        }

        fn execute(
            &mut self,
            world: &mut ItemStore,
            agent: AgentId,
            action: UpgradeAction,
            now: u64,
        ) -> Result<(), EngineError> {
            let mut ctx = SwapContext {
                pins: &mut self.pins,
                backoff: &self.backoff,
                authority: &mut self.authority,
                notifier: &mut self.notifier,
            };
            self.swaps.execute(&mut ctx, world, agent, action, now)
        }

        fn complete(
            &mut self,
            world: &mut ItemStore,
            agent: AgentId,
            equipped: ItemId,
            now: u64,
        ) -> Result<(), EngineError> {
            let mut ctx = SwapContext {
                pins: &mut self.pins,
                backoff: &self.backoff,
                authority: &mut self.authority,
                notifier: &mut self.notifier,
            };
            self.swaps
                .on_equip_completed(&mut ctx, world, agent, equipped, now)
        }

        fn cancel(
            &mut self,
            world: &mut ItemStore,
            agent: AgentId,
            now: u64,
        ) -> Option<PendingUpgrade> {
            let mut ctx = SwapContext {
                pins: &mut self.pins,
                backoff: &self.backoff,
                authority: &mut self.authority,
                notifier: &mut self.notifier,
            };
            self.swaps.cancel(&mut ctx, world, agent, now)
        }

        fn sweep(&mut self, world: &mut ItemStore, now: u64) {
            let mut ctx = SwapContext {
                pins: &mut self.pins,
                backoff: &self.backoff,
                authority: &mut self.authority,
                notifier: &mut self.notifier,
            };
            self.swaps.sweep_stuck(&mut ctx, world, now);
        }
    }

    fn rifle(quality: u8) -> Item {
        Item {
            id: ItemId::new(),
            type_id: ItemTypeId::from("rifle"),
            capability: Capability::Ranged,
            quality: QualityTier::new(quality),
            mass: Decimal::from(3),
            market_value: Decimal::from(100),
            damage_per_hit: Decimal::from(12),
            ticks_per_attack: 60,
            min_wielder_size: Decimal::ONE,
        }
    }

    #[test]
    fn pick_up_clears_the_failed_record() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let id = world.spawn_item(rifle(3), Position::default()).unwrap();
        harness.backoff.record_failure(agent, &[id], 0);

        harness
            .execute(&mut world, agent, UpgradeAction::PickUp { item: id }, 10)
            .unwrap();

        assert_eq!(world.container_of(id), Some(Container::Carried(agent)));
        assert!(!harness.backoff.has_failed_item(agent, id));
    }

    #[test]
    fn equip_upgrade_drops_old_with_cooldown_and_migrates_pin() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        world.set_agent_position(agent, Position::new(5, 5));
        let old = world.spawn_item(rifle(0), Position::default()).unwrap();
        let new = world.spawn_item(rifle(7), Position::default()).unwrap();
        world.equip(agent, old).unwrap();
        let old_item = world.item(old).unwrap().clone();
        harness.pins.pin_item(agent, &old_item);

        harness
            .execute(&mut world, agent, UpgradeAction::EquipUpgrade { old, new }, 100)
            .unwrap();

        assert_eq!(world.primary_of(agent), Some(new));
        assert_eq!(world.container_of(old), Some(Container::World));
        assert_eq!(world.item_position(old), Some(Position::new(5, 5)));
        assert!(world.is_on_drop_cooldown(old, 100));
        assert!(world.is_on_drop_cooldown(old, 399));
        assert!(!world.is_on_drop_cooldown(old, 400));
        // The pin followed the upgrade; nothing dangles on the old item.
        assert!(harness.pins.is_item_pinned(agent, new));
        assert!(!harness.pins.is_item_pinned(agent, old));
    }

    #[test]
    fn temporary_swap_stays_pending_until_confirmed() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let primary = world.spawn_item(rifle(4), Position::default()).unwrap();
        let held = world.spawn_item(rifle(0), Position::default()).unwrap();
        let new = world.spawn_item(rifle(7), Position::default()).unwrap();
        world.equip(agent, primary).unwrap();
        world.pick_up_to_carried(agent, held).unwrap();

        harness
            .execute(&mut world, agent, UpgradeAction::SwapThenEquip { held, new }, 50)
            .unwrap();

        // Mid-sequence: the new item is equipped, the replaced one is
        // still carried, and the upgrade is pending.
        assert_eq!(world.primary_of(agent), Some(new));
        assert!(world.carried_of(agent).contains(&held));
        let pending = harness.swaps.pending_for(agent).unwrap();
        assert_eq!(pending.old_item, held);
        assert_eq!(pending.original_primary, Some(primary));

        harness.complete(&mut world, agent, new, 60).unwrap();

        // Completion: held dropped, original primary restored, new item
        // in the carried set.
        assert_eq!(world.container_of(held), Some(Container::World));
        assert_eq!(world.primary_of(agent), Some(primary));
        assert!(world.carried_of(agent).contains(&new));
        assert!(harness.swaps.pending_for(agent).is_none());
    }

    #[test]
    fn temporary_swap_without_prior_primary_keeps_new_equipped() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let held = world.spawn_item(rifle(0), Position::default()).unwrap();
        let new = world.spawn_item(rifle(7), Position::default()).unwrap();
        world.pick_up_to_carried(agent, held).unwrap();

        harness
            .execute(&mut world, agent, UpgradeAction::SwapThenEquip { held, new }, 0)
            .unwrap();
        harness.complete(&mut world, agent, new, 10).unwrap();

        assert_eq!(world.primary_of(agent), Some(new));
        assert_eq!(world.container_of(held), Some(Container::World));
    }

    #[test]
    fn second_temporary_swap_is_rejected_while_one_is_pending() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let held = world.spawn_item(rifle(0), Position::default()).unwrap();
        let new = world.spawn_item(rifle(7), Position::default()).unwrap();
        let other = world.spawn_item(rifle(6), Position::default()).unwrap();
        world.pick_up_to_carried(agent, held).unwrap();

        harness
            .execute(&mut world, agent, UpgradeAction::SwapThenEquip { held, new }, 0)
            .unwrap();
        let result = harness.execute(
            &mut world,
            agent,
            UpgradeAction::SwapThenEquip { held: new, new: other },
            1,
        );
        assert!(matches!(result, Err(EngineError::PendingUpgradeExists(_))));
    }

    #[test]
    fn mismatched_completion_keeps_the_pending_record() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let held = world.spawn_item(rifle(0), Position::default()).unwrap();
        let new = world.spawn_item(rifle(7), Position::default()).unwrap();
        let stranger = world.spawn_item(rifle(5), Position::default()).unwrap();
        world.pick_up_to_carried(agent, held).unwrap();

        harness
            .execute(&mut world, agent, UpgradeAction::SwapThenEquip { held, new }, 0)
            .unwrap();
        let result = harness.complete(&mut world, agent, stranger, 10);

        assert!(matches!(result, Err(EngineError::MismatchedCompletion { .. })));
        assert!(harness.swaps.pending_for(agent).is_some());
    }

    #[test]
    fn completion_without_pending_is_a_no_op() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let id = world.spawn_item(rifle(3), Position::default()).unwrap();

        assert!(harness.complete(&mut world, agent, id, 0).is_ok());
    }

    #[test]
    fn replace_worst_frees_capacity_then_picks_up() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let worst = world.spawn_item(rifle(0), Position::default()).unwrap();
        let better = world.spawn_item(rifle(7), Position::default()).unwrap();
        world.pick_up_to_carried(agent, worst).unwrap();

        harness
            .execute(
                &mut world,
                agent,
                UpgradeAction::ReplaceWorst { drop: worst, pick_up: better },
                200,
            )
            .unwrap();

        assert_eq!(world.container_of(worst), Some(Container::World));
        assert!(world.is_on_drop_cooldown(worst, 200));
        assert_eq!(world.container_of(better), Some(Container::Carried(agent)));
    }

    #[test]
    fn failed_pick_up_after_drop_leaves_item_on_the_ground() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let thief = AgentId::new();
        let worst = world.spawn_item(rifle(0), Position::default()).unwrap();
        let contested = world.spawn_item(rifle(7), Position::default()).unwrap();
        world.pick_up_to_carried(agent, worst).unwrap();
        // Someone else grabs the candidate between decision and action.
        world.pick_up_to_carried(thief, contested).unwrap();

        let result = harness.execute(
            &mut world,
            agent,
            UpgradeAction::ReplaceWorst { drop: worst, pick_up: contested },
            0,
        );

        assert!(matches!(
            result,
            Err(EngineError::SwapStepFailed { step: "pick_up_after_drop", .. })
        ));
        // The dropped item is not restored; the agent retries later.
        assert_eq!(world.container_of(worst), Some(Container::World));
        assert_eq!(world.container_of(contested), Some(Container::Carried(thief)));
    }

    #[test]
    fn cancel_leaves_a_single_instance_of_the_type() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let held = world.spawn_item(rifle(0), Position::default()).unwrap();
        let new = world.spawn_item(rifle(7), Position::default()).unwrap();
        world.pick_up_to_carried(agent, held).unwrap();
        let held_item = world.item(held).unwrap().clone();
        harness.pins.pin_item(agent, &held_item);
        harness
            .execute(&mut world, agent, UpgradeAction::SwapThenEquip { held, new }, 0)
            .unwrap();

        assert!(harness.cancel(&mut world, agent, 5).is_some());
        assert!(harness.swaps.pending_for(agent).is_none());

        // The in-flight swap was finished, not merely forgotten: the
        // replaced item is on the ground and the agent does not end up
        // holding two rifles.
        assert_eq!(world.container_of(held), Some(Container::World));
        assert!(world.is_on_drop_cooldown(held, 5));
        assert_eq!(world.primary_of(agent), Some(new));
        assert_eq!(world.count_of_type(agent, &ItemTypeId::from("rifle")), 1);
        // The pin moved with the replacement.
        assert!(harness.pins.is_item_pinned(agent, new));
        assert!(!harness.pins.is_item_pinned(agent, held));
    }

    #[test]
    fn sweep_reclaims_only_timed_out_pendings() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let held = world.spawn_item(rifle(0), Position::default()).unwrap();
        let new = world.spawn_item(rifle(7), Position::default()).unwrap();
        world.pick_up_to_carried(agent, held).unwrap();
        harness
            .execute(&mut world, agent, UpgradeAction::SwapThenEquip { held, new }, 100)
            .unwrap();

        harness.sweep(&mut world, 400);
        assert!(harness.swaps.pending_for(agent).is_some());

        harness.sweep(&mut world, 700);
        assert!(harness.swaps.pending_for(agent).is_none());
        // The replaced item was dropped so the agent is not stuck with a
        // duplicate.
        assert_eq!(world.container_of(held), Some(Container::World));
    }

    #[test]
    fn sweep_migrates_the_pin_and_restores_the_primary() {
        let mut harness = Harness::new();
        let mut world = ItemStore::new();
        let agent = AgentId::new();
        let mut sword = rifle(4);
        sword.type_id = ItemTypeId::from("sword");
        let primary = world.spawn_item(sword, Position::default()).unwrap();
        let held = world.spawn_item(rifle(0), Position::default()).unwrap();
        let new = world.spawn_item(rifle(7), Position::default()).unwrap();
        world.equip(agent, primary).unwrap();
        world.pick_up_to_carried(agent, held).unwrap();
        let held_item = world.item(held).unwrap().clone();
        harness.pins.pin_item(agent, &held_item);
        harness
            .execute(&mut world, agent, UpgradeAction::SwapThenEquip { held, new }, 0)
            .unwrap();

        harness.sweep(&mut world, 700);

        // Reclamation runs the full completion: old dropped, original
        // primary back in place, new item carried, pin on the new item.
        assert_eq!(world.container_of(held), Some(Container::World));
        assert_eq!(world.primary_of(agent), Some(primary));
        assert!(world.carried_of(agent).contains(&new));
        assert!(harness.pins.is_item_pinned(agent, new));
        assert!(!harness.pins.is_item_pinned(agent, held));
    }
}
