//! The tick driver: one engine pass per scheduling signal.
//!
//! The host calls [`UpgradeEngine::run_tick`] with the current world
//! and the agents due for evaluation this tick. Agents with an upgrade
//! in flight are either confirmed (the equip pathway reports the new
//! item as primary) or left pending; everyone else gets one decision
//! pass. Cleanup sweeps run on a coarse interval, never every tick.

use tracing::{error, info};

use regear_types::{AgentId, AgentProfile};
use regear_world::ItemStore;

use crate::authority::AuthorityAdapter;
use crate::backoff::FailedSearchCache;
use crate::config::EngineConfig;
use crate::decision::{decide, Decision, DecisionContext};
use crate::notify::{NullNotifier, UpgradeNotifier};
use crate::pins::PinnedRegistry;
use crate::score::ScoreCache;
use crate::swap::{SwapContext, SwapOrchestrator};

/// Counters describing what one tick pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Agents for which an action was executed.
    pub acted: usize,
    /// Agents whose scan found nothing worth taking.
    pub none_found: usize,
    /// Agents skipped inside a backoff window.
    pub on_cooldown: usize,
    /// Agents ineligible for automatic management.
    pub unavailable: usize,
    /// Agents still waiting on an in-flight upgrade.
    pub pending: usize,
    /// Temporary swaps confirmed and finished this tick.
    pub completed: usize,
    /// Sequences aborted by a failed step.
    pub aborted: usize,
}

/// The assembled upgrade engine: all component state plus the driver.
pub struct UpgradeEngine {
    config: EngineConfig,
    scores: ScoreCache,
    pins: PinnedRegistry,
    backoff: FailedSearchCache,
    authority: AuthorityAdapter,
    swaps: SwapOrchestrator,
    notifier: Box<dyn UpgradeNotifier>,
    last_cleanup_tick: Option<u64>,
}

impl std::fmt::Debug for UpgradeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeEngine")
            .field("config", &self.config)
            .field("authority", &self.authority)
            .field("last_cleanup_tick", &self.last_cleanup_tick)
            .finish_non_exhaustive()
    }
}

impl UpgradeEngine {
    /// Assemble an engine from configuration, with no capacity
    /// authority bound and the null notifier.
    pub fn new(config: EngineConfig) -> Self {
        let scores = ScoreCache::new(config.score_ttl_ticks);
        let backoff = FailedSearchCache::new(
            config.backoff_base_ticks,
            config.backoff_ceiling_ticks(),
            config.cleanup_interval_ticks,
        );
        let swaps = SwapOrchestrator::new(
            config.drop_cooldown_ticks,
            config.pending_upgrade_timeout_ticks,
        );
        Self {
            scores,
            pins: PinnedRegistry::new(),
            backoff,
            authority: AuthorityAdapter::unbound(),
            swaps,
            notifier: Box::new(NullNotifier),
            last_cleanup_tick: None,
            config,
        }
    }

    /// Replace the capacity-authority binding.
    #[must_use]
    pub fn with_authority(mut self, authority: AuthorityAdapter) -> Self {
        self.authority = authority;
        self
    }

    /// Replace the notifier binding.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn UpgradeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// The engine's configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The pinned registry, for owner pin management and persistence.
    pub const fn pins(&self) -> &PinnedRegistry {
        &self.pins
    }

    /// Mutable access to the pinned registry.
    pub const fn pins_mut(&mut self) -> &mut PinnedRegistry {
        &mut self.pins
    }

    /// Run one engine pass over the given agents.
    pub fn run_tick(
        &mut self,
        world: &mut ItemStore,
        agents: &[AgentProfile],
        now: u64,
    ) -> TickSummary {
        let mut summary = TickSummary::default();

        for agent in agents {
            self.process_agent(world, agent, now, &mut summary);
        }

        self.maybe_cleanup(world, now);
        summary
    }

    fn process_agent(
        &mut self,
        world: &mut ItemStore,
        agent: &AgentProfile,
        now: u64,
        summary: &mut TickSummary,
    ) {
        if let Some(pending) = self.swaps.pending_for(agent.id).copied() {
            if agent.player_controlled {
                let mut ctx = SwapContext {
                    pins: &mut self.pins,
                    backoff: &self.backoff,
                    authority: &mut self.authority,
                    notifier: self.notifier.as_mut(),
                };
                self.swaps.cancel(&mut ctx, world, agent.id, now);
                summary.unavailable = summary.unavailable.saturating_add(1);
                return;
            }
            // The equip pathway reports success by the new item sitting
            // in the primary slot.
            if world.primary_of(agent.id) == Some(pending.new_item) {
                let mut ctx = SwapContext {
                    pins: &mut self.pins,
                    backoff: &self.backoff,
                    authority: &mut self.authority,
                    notifier: self.notifier.as_mut(),
                };
                match self
                    .swaps
                    .on_equip_completed(&mut ctx, world, agent.id, pending.new_item, now)
                {
                    Ok(()) => summary.completed = summary.completed.saturating_add(1),
                    Err(err) => {
                        error!(agent = %agent.id, %err, "failed to finish temporary swap");
                        summary.aborted = summary.aborted.saturating_add(1);
                    }
                }
            } else {
                summary.pending = summary.pending.saturating_add(1);
            }
            return;
        }

        let decision = {
            let mut ctx = DecisionContext {
                config: &self.config,
                scores: &mut self.scores,
                pins: &self.pins,
                backoff: &self.backoff,
                authority: &mut self.authority,
                now,
            };
            decide(&mut ctx, world, &*world, agent)
        };

        match decision {
            Decision::Act(action) => {
                let mut ctx = SwapContext {
                    pins: &mut self.pins,
                    backoff: &self.backoff,
                    authority: &mut self.authority,
                    notifier: self.notifier.as_mut(),
                };
                match self.swaps.execute(&mut ctx, world, agent.id, action, now) {
                    Ok(()) => summary.acted = summary.acted.saturating_add(1),
                    Err(err) => {
                        error!(agent = %agent.id, %err, "upgrade sequence aborted");
                        summary.aborted = summary.aborted.saturating_add(1);
                    }
                }
            }
            Decision::NoneFound { considered } => {
                self.backoff.record_failure(agent.id, &considered, now);
                summary.none_found = summary.none_found.saturating_add(1);
            }
            Decision::OnCooldown => {
                summary.on_cooldown = summary.on_cooldown.saturating_add(1);
            }
            Decision::Unavailable => {
                summary.unavailable = summary.unavailable.saturating_add(1);
            }
        }
    }

    fn maybe_cleanup(&mut self, world: &mut ItemStore, now: u64) {
        let due = match self.last_cleanup_tick {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.config.cleanup_interval_ticks,
        };
        if !due {
            return;
        }
        self.last_cleanup_tick = Some(now);
        let mut ctx = SwapContext {
            pins: &mut self.pins,
            backoff: &self.backoff,
            authority: &mut self.authority,
            notifier: self.notifier.as_mut(),
        };
        self.swaps.sweep_stuck(&mut ctx, world, now);
        self.scores.evict(now);
        self.backoff.cleanup(now);
        world.purge_expired_cooldowns(now);
        info!(tick = now, "cleanup sweep completed");
    }

    /// Diagnostic dump of the failed-search cache. Safe to call from a
    /// context other than the tick driver's.
    pub fn backoff_report(&self, now: u64) -> String {
        self.backoff.report(now)
    }

    /// Lifecycle hook: the world collaborator destroyed an agent. All
    /// component state for the agent is discarded and its held items
    /// are dropped where it stood.
    pub fn on_agent_removed(&mut self, world: &mut ItemStore, agent: AgentId) {
        self.swaps.on_agent_removed(agent);
        self.pins.on_agent_removed(agent);
        self.backoff.on_agent_removed(agent);
        world.on_agent_removed(agent);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use regear_types::{Capability, Item, ItemId, ItemTypeId, QualityTier};
    use regear_world::{Container, Position};
    use rust_decimal::Decimal;

    fn npc() -> AgentProfile {
        AgentProfile {
            id: AgentId::new(),
            prefer_melee: false,
            body_size: Decimal::from(2),
            player_controlled: false,
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

    fn place_near(world: &mut ItemStore, agent: AgentId, item: Item) -> ItemId {
        world.set_agent_position(agent, Position::default());
        world.spawn_item(item, Position::new(1, 0)).unwrap()
    }

    #[test]
    fn tick_executes_a_pickup_decision() {
        let mut engine = UpgradeEngine::new(EngineConfig::default());
        let mut world = ItemStore::new();
        let agent = npc();
        let id = place_near(&mut world, agent.id, rifle(3));

        let summary = engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);
        assert_eq!(summary.acted, 1);
        assert_eq!(world.container_of(id), Some(Container::Carried(agent.id)));
    }

    #[test]
    fn fruitless_tick_starts_a_backoff_window() {
        let mut engine = UpgradeEngine::new(EngineConfig::default());
        let mut world = ItemStore::new();
        let agent = npc();
        world.set_agent_position(agent.id, Position::default());

        let first = engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);
        assert_eq!(first.none_found, 1);

        let second = engine.run_tick(&mut world, std::slice::from_ref(&agent), 10);
        assert_eq!(second.on_cooldown, 1);
    }

    #[test]
    fn temporary_swap_completes_on_a_later_tick() {
        let mut engine = UpgradeEngine::new(EngineConfig::default());
        let mut world = ItemStore::new();
        let agent = npc();
        let held = place_near(&mut world, agent.id, rifle(0));
        world.pick_up_to_carried(agent.id, held).unwrap();
        let better = place_near(&mut world, agent.id, rifle(7));

        let start = engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);
        assert_eq!(start.acted, 1);
        assert_eq!(world.primary_of(agent.id), Some(better));

        let finish = engine.run_tick(&mut world, std::slice::from_ref(&agent), 1);
        assert_eq!(finish.completed, 1);
        assert_eq!(world.container_of(held), Some(Container::World));
    }

    #[test]
    fn player_takeover_cancels_the_pending_swap() {
        let mut engine = UpgradeEngine::new(EngineConfig::default());
        let mut world = ItemStore::new();
        let mut agent = npc();
        let held = place_near(&mut world, agent.id, rifle(0));
        world.pick_up_to_carried(agent.id, held).unwrap();
        place_near(&mut world, agent.id, rifle(7));

        engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);

        agent.player_controlled = true;
        let summary = engine.run_tick(&mut world, std::slice::from_ref(&agent), 1);
        assert_eq!(summary.unavailable, 1);

        // The takeover does not strand the agent with both instances:
        // the replaced item was dropped as part of cancellation.
        assert_eq!(world.container_of(held), Some(Container::World));
        assert_eq!(world.count_of_type(agent.id, &ItemTypeId::from("rifle")), 1);

        // Control is released; no stale pending record remains, so a
        // fresh decision pass runs.
        agent.player_controlled = false;
        let next = engine.run_tick(&mut world, std::slice::from_ref(&agent), 2);
        assert_eq!(next.pending, 0);
    }

    #[test]
    fn agent_removal_clears_engine_state_and_drops_items() {
        let mut engine = UpgradeEngine::new(EngineConfig::default());
        let mut world = ItemStore::new();
        let agent = npc();
        let id = place_near(&mut world, agent.id, rifle(3));
        world.pick_up_to_carried(agent.id, id).unwrap();

        engine.on_agent_removed(&mut world, agent.id);
        assert_eq!(world.container_of(id), Some(Container::World));
        assert!(world.held_items(agent.id).is_empty());
    }

    #[test]
    fn backoff_report_surfaces_waiting_agents() {
        let mut engine = UpgradeEngine::new(EngineConfig::default());
        let mut world = ItemStore::new();
        let agent = npc();
        world.set_agent_position(agent.id, Position::default());

        engine.run_tick(&mut world, std::slice::from_ref(&agent), 0);
        let report = engine.backoff_report(0);
        assert!(report.contains(&agent.id.to_string()));
    }
}
