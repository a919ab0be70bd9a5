//! Bounded LRU verdict cache.
//!
//! Entries are keyed by (content hash, rule-set version), so verdicts cached
//! against an older rule table are unreachable by construction and simply age
//! out. Eviction is strict least-recently-used over a fixed entry count to
//! keep latency predictable.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::validator::SafetyVerdict;

/// Default number of cached verdicts.
pub const DEFAULT_VERDICT_CACHE_CAPACITY: usize = 1024;

pub(crate) type CacheKey = ([u8; 32], u64);

/// Snapshot counters exposed for cache observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct CacheSlot {
    verdict: SafetyVerdict,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheSlot>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

#[derive(Debug)]
pub(crate) struct VerdictCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl VerdictCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub(crate) fn lookup(&self, key: &CacheKey) -> Option<SafetyVerdict> {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = &mut *guard;
        state.tick = state.tick.saturating_add(1);
        let tick = state.tick;
        match state.entries.get_mut(key) {
            Some(slot) => {
                slot.last_used = tick;
                state.hits = state.hits.saturating_add(1);
                Some(slot.verdict.clone())
            }
            None => {
                state.misses = state.misses.saturating_add(1);
                None
            }
        }
    }

    pub(crate) fn store(&self, key: CacheKey, verdict: SafetyVerdict) {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = &mut *guard;
        state.tick = state.tick.saturating_add(1);
        let tick = state.tick;

        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            let stalest = state
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(stale_key, _)| *stale_key);
            if let Some(stale_key) = stalest {
                state.entries.remove(&stale_key);
                state.evictions = state.evictions.saturating_add(1);
            }
        }

        state.entries.insert(
            key,
            CacheSlot {
                verdict,
                last_used: tick,
            },
        );
    }

    pub(crate) fn counters(&self) -> CacheCounters {
        let state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        CacheCounters {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            entries: state.entries.len(),
        }
    }
}
