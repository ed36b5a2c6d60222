//! Frequency counters over the four embed categories.
//!
//! Four disjoint maps share a single coarse lock — contention is
//! expected to be low relative to the HTTP work each worker otherwise
//! does, and a single lock keeps the "did this increment cross an alert
//! threshold" check atomic with the increment itself.
//!
//! Counters are intentionally unbounded for the lifetime of the process;
//! see the design notes on why this core does not add LRU/LFU eviction
//! here (that would silently change observable counts).

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Maps {
    images: HashMap<String, u64>,
    videos: HashMap<String, u64>,
    records: HashMap<String, u64>,
    externals: HashMap<String, u64>,
}

/// Outcome of observing one key: the new count, and whether this
/// observation crosses a geometric alert milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub count: u64,
    pub alert: bool,
}

pub struct FrequencyCounters {
    maps: Mutex<Maps>,
}

impl FrequencyCounters {
    pub fn new() -> Self {
        Self {
            maps: Mutex::new(Maps::default()),
        }
    }

    pub fn image_seen(&self, cid: &str, factor: u64) -> Observation {
        self.observe(|m| &mut m.images, cid, factor)
    }

    pub fn video_seen(&self, cid: &str, factor: u64) -> Observation {
        self.observe(|m| &mut m.videos, cid, factor)
    }

    pub fn record_seen(&self, uri: &str, factor: u64) -> Observation {
        self.observe(|m| &mut m.records, uri, factor)
    }

    pub fn external_seen(&self, uri: &str, factor: u64) -> Observation {
        self.observe(|m| &mut m.externals, uri, factor)
    }

    /// True if `uri` has been observed by `external_seen` before (used by
    /// the redirect follower to stop chasing a chain that loops back on a
    /// hop it has already evaluated).
    pub fn external_already_seen(&self, uri: &str) -> bool {
        self.maps.lock().expect("counters lock poisoned").externals.contains_key(uri)
    }

    fn observe(
        &self,
        select: impl FnOnce(&mut Maps) -> &mut HashMap<String, u64>,
        key: &str,
        factor: u64,
    ) -> Observation {
        let mut maps = self.maps.lock().expect("counters lock poisoned");
        let map = select(&mut maps);
        let count = map.entry(key.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        Observation {
            count,
            alert: alert_needed(count, factor),
        }
    }
}

impl Default for FrequencyCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// True when `new_count` lands on (or just crossed) the next geometric
/// milestone `factor^k` for `k = 1, 2, 3, …`. Fires once per milestone no
/// matter how it was reached, so a counter that jumps from 3 straight to
/// 20 (factor 4: milestones 4, 16, 64 …) still alerts exactly once for
/// having crossed 16, not once per skipped milestone.
pub fn alert_needed(new_count: u64, factor: u64) -> bool {
    if factor < 2 || new_count == 0 {
        return false;
    }
    let previous = new_count - 1;
    milestones_below(new_count, factor) > milestones_below(previous, factor)
}

fn milestones_below(count: u64, factor: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    let mut k = 0u64;
    let mut milestone = factor;
    while milestone <= count {
        k += 1;
        match milestone.checked_mul(factor) {
            Some(next) => milestone = next,
            None => break,
        }
    }
    k
}
