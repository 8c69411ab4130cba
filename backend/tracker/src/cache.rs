//! Process-wide read cache with a freshness window.
//!
//! Entries are advisory: they are served while younger than the TTL and are
//! dropped wholesale by [`ReadCache::invalidate_all`] after every confirmed
//! write. A batch is cached as one unit under the key of its full, ordered
//! call list, so every item of a collection always comes from the same read.
//! Failed reads are never stored.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::gateway::{BatchEntry, ReadCall};

#[derive(Debug, Clone)]
enum Cached {
    One(Option<Value>),
    Batch(Vec<BatchEntry>),
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    value: Cached,
}

#[derive(Debug)]
pub struct ReadCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_one(&self, call: &ReadCall) -> Option<Option<Value>> {
        match self.fresh(&one_key(call))? {
            Cached::One(value) => Some(value),
            Cached::Batch(_) => None,
        }
    }

    pub fn put_one(&self, call: &ReadCall, value: Option<Value>) {
        self.store(one_key(call), Cached::One(value));
    }

    pub fn get_batch(&self, calls: &[ReadCall]) -> Option<Vec<BatchEntry>> {
        match self.fresh(&batch_key(calls))? {
            Cached::Batch(entries) => Some(entries),
            Cached::One(_) => None,
        }
    }

    pub fn put_batch(&self, calls: &[ReadCall], entries: Vec<BatchEntry>) {
        self.store(batch_key(calls), Cached::Batch(entries));
    }

    /// Forget everything. Called after any write that may have changed chain state.
    pub fn invalidate_all(&self) {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        debug!("Read cache invalidated ({dropped} entries dropped)");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fresh(&self, key: &str) -> Option<Cached> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            return Some(entry.value.clone());
        }
        entries.remove(key);
        None
    }

    fn store(&self, key: String, value: Cached) {
        self.lock().insert(
            key,
            Entry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned map only ever holds complete entries.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn one_key(call: &ReadCall) -> String {
    format!("one:{}", serde_json::to_string(call).unwrap_or_default())
}

fn batch_key(calls: &[ReadCall]) -> String {
    format!("batch:{}", serde_json::to_string(calls).unwrap_or_default())
}
