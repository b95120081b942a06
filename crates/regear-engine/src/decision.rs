//! The upgrade decision engine.
//!
//! One evaluation pass per agent per scheduling slot: scan nearby
//! reachable items (bounded by radius and sample cap), filter out
//! unusable candidates, and pick the first candidate in distance order
//! that clears the hysteresis threshold against whatever the agent
//! already holds. The engine only decides; executing the resulting
//! action is the swap orchestrator's job.

use tracing::{debug, warn};

use regear_types::{AgentProfile, ItemId, RejectionClass, UpgradeAction};
use regear_world::{ItemStore, WorldQuery};
use rust_decimal::Decimal;

use crate::authority::{classify_rejection, is_mass_related, AuthorityAdapter};
use crate::backoff::FailedSearchCache;
use crate::config::EngineConfig;
use crate::pins::PinnedRegistry;
use crate::score::ScoreCache;

/// The outcome of one evaluation pass for one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// A worthwhile action was found.
    Act(UpgradeAction),
    /// Nothing nearby cleared the bar; the listed candidates were
    /// evaluated and rejected, and should be recorded as failed.
    NoneFound {
        /// Candidates that were fully evaluated this pass.
        considered: Vec<ItemId>,
    },
    /// The agent is inside its failed-search backoff window.
    OnCooldown,
    /// The agent is not eligible for automatic management at all.
    Unavailable,
}

/// Shared engine state the decision pass reads and updates.
pub struct DecisionContext<'a> {
    /// Engine tunables.
    pub config: &'a EngineConfig,
    /// Memoizing score cache.
    pub scores: &'a mut ScoreCache,
    /// Owner-designated pins.
    pub pins: &'a PinnedRegistry,
    /// Failed-search records.
    pub backoff: &'a FailedSearchCache,
    /// Capacity authority binding.
    pub authority: &'a mut AuthorityAdapter,
    /// Current simulation tick.
    pub now: u64,
}

/// Run one evaluation pass for one agent. `query` is the spatial
/// collaborator the scan goes through; [`ItemStore`] itself serves for
/// hosts without a dedicated index.
pub fn decide(
    ctx: &mut DecisionContext<'_>,
    world: &ItemStore,
    query: &dyn WorldQuery,
    agent: &AgentProfile,
) -> Decision {
    if agent.player_controlled {
        return Decision::Unavailable;
    }
    if ctx.backoff.is_on_cooldown(agent.id, ctx.now) {
        return Decision::OnCooldown;
    }

    let mut candidates = query.nearby_reachable_items(agent.id, ctx.config.scan_radius);
    candidates.truncate(ctx.config.scan_sample_cap);

    let mut considered = Vec::new();
    for candidate_id in candidates {
        // The scan may be served from a coarse index; confirm the item
        // is still individually reachable before spending a score on it.
        if !query.is_reachable(agent.id, candidate_id) {
            continue;
        }
        // Previously failed items stay skipped until a success or the
        // record ages out; re-recording them would inflate the window.
        if ctx.backoff.has_failed_item(agent.id, candidate_id) {
            continue;
        }
        if world.is_on_drop_cooldown(candidate_id, ctx.now) {
            continue;
        }
        let Some(candidate) = world.item(candidate_id) else {
            continue;
        };
        if candidate.min_wielder_size > agent.body_size {
            considered.push(candidate_id);
            continue;
        }

        let holdings = world.holdings_of_type(agent.id, &candidate.type_id);
        if !ctx.config.forced_upgrades
            && holdings
                .iter()
                .any(|held| ctx.pins.is_item_pinned(agent.id, *held))
        {
            considered.push(candidate_id);
            continue;
        }

        let candidate_score = ctx
            .scores
            .score(candidate, agent.id, agent.prefer_melee, ctx.now);

        let action = if holdings.is_empty() || ctx.config.allow_duplicates {
            evaluate_acquisition(ctx, world, agent, candidate_id, candidate_score)
        } else {
            evaluate_type_upgrade(ctx, world, agent, candidate_id, candidate_score, &holdings)
        };

        match action {
            Some(action) => return Decision::Act(action),
            None => considered.push(candidate_id),
        }
    }

    Decision::NoneFound { considered }
}

/// The agent holds nothing of this type (or duplicates are allowed):
/// try a plain pick-up, falling back to replace-worst on a capacity
/// rejection.
fn evaluate_acquisition(
    ctx: &mut DecisionContext<'_>,
    world: &ItemStore,
    agent: &AgentProfile,
    candidate_id: ItemId,
    candidate_score: Decimal,
) -> Option<UpgradeAction> {
    let candidate = world.item(candidate_id)?;
    let verdict = ctx.authority.can_accept(candidate, agent.id, world);
    if verdict.accepted {
        return Some(UpgradeAction::PickUp { item: candidate_id });
    }

    match classify_rejection(&verdict.reason) {
        RejectionClass::Filter => {
            // The authority's policy is final; no workaround exists.
            debug!(agent = %agent.id, item = %candidate_id, reason = %verdict.reason,
                "candidate rejected by authority policy");
            None
        }
        RejectionClass::Capacity if ctx.config.upgrade_by_replacement => {
            evaluate_replacement(ctx, world, agent, candidate_id, candidate_score, &verdict.reason)
        }
        RejectionClass::Capacity | RejectionClass::Other => None,
    }
}

/// Answer a capacity rejection by dropping the worst-scoring unpinned
/// held item, but only when the candidate is a clear improvement and
/// the trade cannot worsen the rejected constraint.
fn evaluate_replacement(
    ctx: &mut DecisionContext<'_>,
    world: &ItemStore,
    agent: &AgentProfile,
    candidate_id: ItemId,
    candidate_score: Decimal,
    rejection_reason: &str,
) -> Option<UpgradeAction> {
    let candidate = world.item(candidate_id)?;
    let (worst_id, worst_score) = worst_unpinned_held(ctx, world, agent)?;
    let worst = world.item(worst_id)?;

    let bar = worst_score.checked_mul(ctx.config.upgrade_threshold())?;
    if candidate_score < bar {
        return None;
    }
    // A mass rejection cannot be answered by swapping in something
    // heavier than what goes out.
    if is_mass_related(rejection_reason) && candidate.mass > worst.mass {
        return None;
    }

    Some(UpgradeAction::ReplaceWorst {
        drop: worst_id,
        pick_up: candidate_id,
    })
}

/// The agent already holds this type: a strictly better instance may
/// replace the held one.
fn evaluate_type_upgrade(
    ctx: &mut DecisionContext<'_>,
    world: &ItemStore,
    agent: &AgentProfile,
    candidate_id: ItemId,
    candidate_score: Decimal,
    holdings: &[ItemId],
) -> Option<UpgradeAction> {
    if !ctx.config.same_type_upgrades {
        return None;
    }
    if holdings.len() > 1 {
        // Duplicates should not exist when the config forbids them;
        // self-heal by upgrading away the worst one.
        warn!(agent = %agent.id, count = holdings.len(),
            "duplicate holdings of one type found during evaluation");
    }

    let held_id = worst_of(ctx, world, agent, holdings.iter().copied())?;
    let held = world.item(held_id)?;
    let held_score = ctx.scores.score(held, agent.id, agent.prefer_melee, ctx.now);

    let bar = held_score.checked_mul(ctx.config.upgrade_threshold())?;
    if candidate_score < bar {
        return None;
    }

    if world.primary_of(agent.id) == Some(held_id) {
        Some(UpgradeAction::EquipUpgrade {
            old: held_id,
            new: candidate_id,
        })
    } else {
        Some(UpgradeAction::SwapThenEquip {
            held: held_id,
            new: candidate_id,
        })
    }
}

/// The worst-scoring held item whose type is not pinned. Returns its
/// score alongside the ID so the caller can apply the threshold.
fn worst_unpinned_held(
    ctx: &mut DecisionContext<'_>,
    world: &ItemStore,
    agent: &AgentProfile,
) -> Option<(ItemId, Decimal)> {
    let pins = ctx.pins;
    let eligible = world.held_items(agent.id).into_iter().filter(|id| {
        world.item(*id).is_some_and(|item| {
            !pins.is_type_pinned(agent.id, &item.type_id)
                && !pins.is_item_pinned(agent.id, *id)
        })
    });
    let worst = worst_of(ctx, world, agent, eligible)?;
    let item = world.item(worst)?;
    let score = ctx.scores.score(item, agent.id, agent.prefer_melee, ctx.now);
    Some((worst, score))
}

/// The lowest-scoring item among `ids`, ties broken by ID for
/// determinism.
fn worst_of(
    ctx: &mut DecisionContext<'_>,
    world: &ItemStore,
    agent: &AgentProfile,
    ids: impl Iterator<Item = ItemId>,
) -> Option<ItemId> {
    let mut worst: Option<(Decimal, ItemId)> = None;
    for id in ids {
        let Some(item) = world.item(id) else {
            continue;
        };
        let score = ctx.scores.score(item, agent.id, agent.prefer_melee, ctx.now);
        let beats = match worst {
            None => true,
            Some((best_score, best_id)) => {
                score < best_score || (score == best_score && id < best_id)
            }
        };
        if beats {
            worst = Some((score, id));
        }
    }
    worst.map(|(_, id)| id)
}
