//! Per-agent failed-search records with exponential backoff.
//!
//! When a scan finds nothing worth taking, the agent enters a backoff
//! window that doubles per consecutive failure up to a ceiling, so an
//! agent with no suitable item nearby is not re-scanned every
//! scheduling tick. Specific items that failed are remembered and
//! skipped even after the window reopens, until they succeed or the
//! record ages out.
//!
//! The cache sits behind a [`Mutex`] because the diagnostic report may
//! be read from a different execution context (a debug overlay)
//! concurrently with tick processing. Every other engine table is
//! touched only from the scheduling context and carries no lock.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};

use regear_types::{AgentId, ItemId};

/// A single agent's failed-search state.
#[derive(Debug, Clone, Default)]
struct FailedSearchRecord {
    fail_count: u32,
    last_fail_tick: u64,
    next_allowed_tick: u64,
    failed_items: BTreeSet<ItemId>,
}

#[derive(Debug, Default)]
struct BackoffState {
    records: BTreeMap<AgentId, FailedSearchRecord>,
    last_purge_tick: Option<u64>,
}

/// Read-only view of one agent's backoff state, for diagnostics and
/// tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffStats {
    /// Consecutive failed searches.
    pub fail_count: u32,
    /// Number of specific items remembered as failed.
    pub failed_items: usize,
    /// The first tick at which a new scan is allowed.
    pub next_allowed_tick: u64,
}

/// Per-agent failed-search cache with exponential backoff windows.
#[derive(Debug)]
pub struct FailedSearchCache {
    inner: Mutex<BackoffState>,
    base_ticks: u64,
    ceiling_ticks: u64,
    purge_interval_ticks: u64,
}

impl FailedSearchCache {
    /// Create a cache with the given base window, ceiling, and purge
    /// cadence (all in ticks).
    pub const fn new(base_ticks: u64, ceiling_ticks: u64, purge_interval_ticks: u64) -> Self {
        Self {
            inner: Mutex::new(BackoffState {
                records: BTreeMap::new(),
                last_purge_tick: None,
            }),
            base_ticks,
            ceiling_ticks,
            purge_interval_ticks,
        }
    }

    /// Backoff window for a given consecutive-failure count:
    /// `min(base * 2^(fail_count - 1), ceiling)`.
    pub const fn window(&self, fail_count: u32) -> u64 {
        window_for(self.base_ticks, self.ceiling_ticks, fail_count)
    }

    /// Whether the agent is still inside its backoff window.
    pub fn is_on_cooldown(&self, agent: AgentId, now: u64) -> bool {
        self.lock()
            .records
            .get(&agent)
            .is_some_and(|record| now < record.next_allowed_tick)
    }

    /// Whether a specific item previously failed for this agent and is
    /// still being skipped.
    pub fn has_failed_item(&self, agent: AgentId, item: ItemId) -> bool {
        self.lock()
            .records
            .get(&agent)
            .is_some_and(|record| record.failed_items.contains(&item))
    }

    /// Record an unsuccessful search: increment the failure count,
    /// remember the attempted items, and recompute the next allowed
    /// tick. The window is monotonically non-decreasing in the failure
    /// count, up to the ceiling.
    pub fn record_failure(&self, agent: AgentId, attempted: &[ItemId], now: u64) {
        let mut state = self.lock();
        let record = state.records.entry(agent).or_default();
        record.fail_count = record.fail_count.saturating_add(1);
        record.last_fail_tick = now;
        record.failed_items.extend(attempted.iter().copied());
        let window = window_for(self.base_ticks, self.ceiling_ticks, record.fail_count);
        record.next_allowed_tick = now.saturating_add(window);
    }

    /// Credit a success on one item: forget only that item. If other
    /// failed items remain tracked, the failure count decrements
    /// (floor 1), preserving partial backoff; otherwise the whole
    /// record is discarded.
    pub fn record_success(&self, agent: AgentId, item: ItemId) {
        let mut state = self.lock();
        let Some(record) = state.records.get_mut(&agent) else {
            return;
        };
        record.failed_items.remove(&item);
        if record.failed_items.is_empty() {
            state.records.remove(&agent);
        } else {
            record.fail_count = record.fail_count.saturating_sub(1).max(1);
            let window = window_for(self.base_ticks, self.ceiling_ticks, record.fail_count);
            record.next_allowed_tick = record.last_fail_tick.saturating_add(window);
        }
    }

    /// Purge records whose last failure is older than the maximum
    /// possible window. The purge itself runs only when the configured
    /// interval has elapsed since the previous purge, not on every call.
    pub fn cleanup(&self, now: u64) {
        let mut state = self.lock();
        if let Some(last) = state.last_purge_tick {
            if now.saturating_sub(last) < self.purge_interval_ticks {
                return;
            }
        }
        state.last_purge_tick = Some(now);
        let ceiling = self.ceiling_ticks;
        state
            .records
            .retain(|_, record| now.saturating_sub(record.last_fail_tick) <= ceiling);
    }

    /// Lifecycle hook: the world collaborator destroyed an agent.
    pub fn on_agent_removed(&self, agent: AgentId) {
        self.lock().records.remove(&agent);
    }

    /// Read-only stats for one agent, if a record exists.
    pub fn stats(&self, agent: AgentId) -> Option<BackoffStats> {
        self.lock().records.get(&agent).map(|record| BackoffStats {
            fail_count: record.fail_count,
            failed_items: record.failed_items.len(),
            next_allowed_tick: record.next_allowed_tick,
        })
    }

    /// Human-readable dump of the whole cache for operational
    /// troubleshooting. Read-only, no side effects.
    pub fn report(&self, now: u64) -> String {
        let state = self.lock();
        let mut out = String::new();
        for (agent, record) in &state.records {
            let retry_in = record.next_allowed_tick.saturating_sub(now);
            let _ = writeln!(
                out,
                "agent {agent}: failures={} failed_items={} retry_in={retry_in}",
                record.fail_count,
                record.failed_items.len(),
            );
        }
        out
    }

    fn lock(&self) -> MutexGuard<'_, BackoffState> {
        // A poisoned lock only means a panicking reader; the state
        // itself is still coherent.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Free-function form of the window computation so record mutation can
/// use it while the state lock is held.
const fn window_for(base: u64, ceiling: u64, fail_count: u32) -> u64 {
    if fail_count == 0 {
        return 0;
    }
    let shift = {
        let s = fail_count.saturating_sub(1);
        if s > 63 { 63 } else { s }
    };
    let factor = match 1_u64.checked_shl(shift) {
        Some(f) => f,
        None => u64::MAX,
    };
    let window = base.saturating_mul(factor);
    if window > ceiling { ceiling } else { window }
}
