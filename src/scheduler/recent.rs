use std::{collections::HashMap, hash::Hash};

use chrono::{DateTime, Duration, Utc};

// ---

/// Bounded, time-windowed set of recently handled keys.
///
/// Every check first evicts entries older than the window. If the set is still
/// at capacity the oldest entry is dropped to make room.
#[derive(Debug, Clone)]
pub struct RecentlySeen<K> {
    window: Duration,
    capacity: usize,
    entries: HashMap<K, DateTime<Utc>>,
}

impl<K: Hash + Eq + Clone> RecentlySeen<K> {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// 24-hour window.
    pub fn daily(capacity: usize) -> Self {
        Self::new(Duration::hours(24), capacity)
    }

    /// Record `key` as seen at `now`. Returns `false` if it was already seen
    /// inside the window (the original timestamp is kept).
    pub fn check_and_insert(&mut self, key: K, now: DateTime<Utc>) -> bool {
        // ---
        self.evict_expired(now);
        if self.entries.contains_key(&key) {
            return false;
        }
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(key, now);
        true
    }

    pub fn contains(&mut self, key: &K, now: DateTime<Utc>) -> bool {
        self.evict_expired(now);
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        self.entries.retain(|_, seen| *seen >= cutoff);
    }

    fn evict_oldest(&mut self) {
        // ---
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, seen)| **seen)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
