//! Item desirability scoring and the memoizing score cache.
//!
//! A score estimates how much an agent wants an item: attack
//! throughput, adjusted by quality tier and by whether the item's
//! capability matches the agent's preference. Scoring never fails --
//! when the stat computation cannot produce a throughput estimate
//! (zero attack interval, overflow) it falls back to the item's raw
//! market value as a coarse proxy.
//!
//! The cache is purely a performance optimization: within the TTL it
//! must be invisible to decision correctness, so entries are keyed by
//! `(item, agent, preference)` and never shared across agents or bias
//! settings.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use regear_types::{AgentId, Capability, Item, ItemId};

/// Penalty applied when agent preference and item capability disagree.
const CROSS_CAPABILITY_PENALTY: Decimal = Decimal::from_parts(70, 0, 0, false, 2);

/// Compute the desirability score for an item, uncached.
///
/// Throughput estimate `damage_per_hit * 100 / ticks_per_attack`,
/// multiplied by the quality-tier bonus, then by a x0.70 penalty when
/// the agent's melee/ranged preference disagrees with the item's
/// capability. Falls back to `market_value` if any step fails.
pub fn raw_score(item: &Item, prefer_melee: bool) -> Decimal {
    let throughput = item
        .damage_per_hit
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(Decimal::from(item.ticks_per_attack)));

    let Some(throughput) = throughput else {
        // Coarse proxy: the stat source could not produce a throughput.
        return item.market_value;
    };

    let quality_adjusted = throughput.checked_mul(item.quality.score_multiplier());
    let Some(quality_adjusted) = quality_adjusted else {
        return item.market_value;
    };

    let is_melee = item.capability == Capability::Melee;
    if prefer_melee == is_melee {
        quality_adjusted
    } else {
        quality_adjusted
            .checked_mul(CROSS_CAPABILITY_PENALTY)
            .unwrap_or(item.market_value)
    }
}

/// Cache key: scores are never shared across agents or bias settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ScoreKey {
    item: ItemId,
    agent: AgentId,
    prefer_melee: bool,
}

#[derive(Debug, Clone, Copy)]
struct ScoreEntry {
    score: Decimal,
    computed_at: u64,
}

/// Memoizing score cache with a short time-to-live.
#[derive(Debug)]
pub struct ScoreCache {
    entries: BTreeMap<ScoreKey, ScoreEntry>,
    ttl_ticks: u64,
}

impl ScoreCache {
    /// Create a cache whose entries live for `ttl_ticks`.
    pub const fn new(ttl_ticks: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            ttl_ticks,
        }
    }

    /// Return the cached score if a live entry exists.
    pub fn get(&self, item: ItemId, agent: AgentId, prefer_melee: bool, now: u64) -> Option<Decimal> {
        let key = ScoreKey {
            item,
            agent,
            prefer_melee,
        };
        self.entries
            .get(&key)
            .filter(|entry| now.saturating_sub(entry.computed_at) < self.ttl_ticks)
            .map(|entry| entry.score)
    }

    /// Insert or refresh a score.
    pub fn put(&mut self, item: ItemId, agent: AgentId, prefer_melee: bool, score: Decimal, now: u64) {
        let key = ScoreKey {
            item,
            agent,
            prefer_melee,
        };
        self.entries.insert(key, ScoreEntry { score, computed_at: now });
    }

    /// Drop all expired entries. Called on the coarse cleanup cadence.
    pub fn evict(&mut self, now: u64) {
        let ttl = self.ttl_ticks;
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.computed_at) < ttl);
    }

    /// Score an item for an agent, memoized.
    pub fn score(&mut self, item: &Item, agent: AgentId, prefer_melee: bool, now: u64) -> Decimal {
        if let Some(score) = self.get(item.id, agent, prefer_melee, now) {
            return score;
        }
        let score = raw_score(item, prefer_melee);
        self.put(item.id, agent, prefer_melee, score, now);
        score
    }

    /// Number of live and expired entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
