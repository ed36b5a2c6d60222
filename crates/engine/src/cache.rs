//! Fixed-capacity LFU cache of account activity
//!
//! `record` upserts an account and bumps its LFU access frequency;
//! `get_account` is a pure read and does not disturb the frequency
//! ordering. Eviction ties (equal frequency) are broken by insertion
//! order — the account that has been in the cache longest among the
//! least-frequently-used group is evicted first.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountActivity {
    Image,
    Video,
    Record,
    External,
    Alert,
}

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub did: String,
    pub image_count: u64,
    pub video_count: u64,
    pub record_count: u64,
    pub external_count: u64,
    pub alert_count: u64,
    pub last_seen: Instant,
}

impl AccountRecord {
    fn new(did: String) -> Self {
        Self {
            did,
            image_count: 0,
            video_count: 0,
            record_count: 0,
            external_count: 0,
            alert_count: 0,
            last_seen: Instant::now(),
        }
    }

    fn apply(&mut self, activity: AccountActivity) {
        match activity {
            AccountActivity::Image => self.image_count += 1,
            AccountActivity::Video => self.video_count += 1,
            AccountActivity::Record => self.record_count += 1,
            AccountActivity::External => self.external_count += 1,
            AccountActivity::Alert => self.alert_count += 1,
        }
        self.last_seen = Instant::now();
    }
}

pub struct AccountEvent {
    pub did: String,
    pub activity: AccountActivity,
}

struct Entry {
    record: AccountRecord,
    freq: u64,
    inserted: u64,
}

type EvictionHook = Box<dyn Fn(&str, &AccountRecord) + Send + Sync>;

struct Inner {
    entries: HashMap<String, Entry>,
    /// (freq, insertion order, did) — BTreeSet gives us the
    /// lowest-frequency, earliest-inserted entry in O(log n).
    order: BTreeSet<(u64, u64, String)>,
    next_seq: u64,
}

pub struct AccountEventCache {
    capacity: usize,
    inner: Mutex<Inner>,
    on_erase: Option<EvictionHook>,
}

impl AccountEventCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeSet::new(),
                next_seq: 0,
            }),
            on_erase: None,
        }
    }

    pub fn with_eviction_hook(capacity: usize, hook: EvictionHook) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeSet::new(),
                next_seq: 0,
            }),
            on_erase: Some(hook),
        }
    }

    /// Upsert the account named by `event.did` and apply the activity.
    /// Evicts the least-frequently-used entry first if this insert would
    /// exceed capacity and the account is new.
    pub fn record(&self, event: AccountEvent) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if let Some(entry) = inner.entries.get_mut(&event.did) {
            inner.order.remove(&(entry.freq, entry.inserted, event.did.clone()));
            entry.freq += 1;
            entry.record.apply(event.activity);
            let freq = entry.freq;
            let inserted = entry.inserted;
            inner.order.insert((freq, inserted, event.did.clone()));
            return;
        }

        if inner.entries.len() >= self.capacity && self.capacity > 0 {
            self.evict_one(&mut inner);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let mut record = AccountRecord::new(event.did.clone());
        record.apply(event.activity);
        inner.entries.insert(
            event.did.clone(),
            Entry {
                record,
                freq: 1,
                inserted: seq,
            },
        );
        inner.order.insert((1, seq, event.did));
    }

    fn evict_one(&self, inner: &mut Inner) {
        if let Some((freq, inserted, did)) = inner.order.iter().next().cloned() {
            inner.order.remove(&(freq, inserted, did.clone()));
            if let Some(entry) = inner.entries.remove(&did) {
                if let Some(hook) = &self.on_erase {
                    hook(&did, &entry.record);
                }
            }
        }
    }

    /// Read-only lookup; does not affect LFU ordering.
    pub fn get_account(&self, did: &str) -> Option<AccountRecord> {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .entries
            .get(did)
            .map(|e| e.record.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
