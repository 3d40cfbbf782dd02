//! Local read cache of month windows.
//!
//! Entries are stored as JSON envelopes through a [`CacheStore`], the way a
//! browser keeps them in local storage. An entry is fresh until its
//! `staleAfter` instant and stale-but-usable afterwards; it is never
//! dropped because of age, only replaced by a successful fetch or purged
//! by an explicit invalidation. An envelope that cannot be read back is
//! evicted and reported as a miss.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gardes_core::models::MonthData;
use gardes_core::{MonthKey, Timestamp};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::PlanningError;

/// Prefix of every cache key in the store.
const KEY_PREFIX: &str = "planning:month:";

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Raw key/value storage behind the month cache.
pub trait CacheStore: Send + Sync {
    fn load(&self, key: &str) -> Option<serde_json::Value>;
    fn store(&mut self, key: &str, value: serde_json::Value);
    fn remove(&mut self, key: &str);
}

/// Process-local storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, serde_json::Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: serde_json::Value) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Stored envelope of one month window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub month_key: MonthKey,
    pub data: MonthData,
    pub fetched_at: Timestamp,
    pub stale_after: Timestamp,
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub data: MonthData,
    /// `false` once the TTL has elapsed; the data is still usable.
    pub fresh: bool,
    pub fetched_at: Timestamp,
}

// ---------------------------------------------------------------------------
// MonthCache
// ---------------------------------------------------------------------------

pub struct MonthCache {
    store: Box<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl MonthCache {
    pub fn new(store: Box<dyn CacheStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self { store, clock, ttl }
    }

    /// Look up a month window.
    ///
    /// Returns `None` on a miss or on an unreadable entry, which is evicted.
    pub fn get(&mut self, month: MonthKey) -> Option<CacheHit> {
        let entry = self.read_entry(month)?;
        let fresh = self.clock.now() < entry.stale_after;
        Some(CacheHit {
            data: entry.data,
            fresh,
            fetched_at: entry.fetched_at,
        })
    }

    pub fn is_fresh(&mut self, month: MonthKey) -> bool {
        self.get(month).is_some_and(|hit| hit.fresh)
    }

    /// Store a freshly fetched window and restart its freshness period.
    pub fn set(&mut self, month: MonthKey, data: MonthData) {
        let now = self.clock.now();
        let entry = CacheEntry {
            month_key: month,
            data,
            fetched_at: now,
            stale_after: self.expiry(now),
        };
        self.write_entry(&entry);
    }

    /// Restart the freshness period without replacing the data.
    ///
    /// Returns `false` if there was nothing to refresh.
    pub fn touch(&mut self, month: MonthKey) -> bool {
        let Some(mut entry) = self.read_entry(month) else {
            return false;
        };
        let now = self.clock.now();
        entry.fetched_at = now;
        entry.stale_after = self.expiry(now);
        self.write_entry(&entry);
        true
    }

    pub fn invalidate(&mut self, month: MonthKey) {
        self.store.remove(&store_key(month));
    }

    /// Purge every cached window that contains `month`.
    ///
    /// Each window spans the previous, current and next month, so a change
    /// in March stales the February, March and April windows.
    pub fn invalidate_range(&mut self, month: MonthKey) -> [MonthKey; 3] {
        let purged = month.window();
        for key in purged {
            self.invalidate(key);
        }
        tracing::debug!(month = %month, "Invalidated cached month range");
        purged
    }

    // ---- private helpers ----

    fn expiry(&self, now: Timestamp) -> Timestamp {
        now.checked_add_signed(self.ttl)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
    }

    fn read_entry(&mut self, month: MonthKey) -> Option<CacheEntry> {
        let key = store_key(month);
        let raw = self.store.load(&key)?;
        match serde_json::from_value::<CacheEntry>(raw) {
            Ok(entry) if entry.month_key == month => Some(entry),
            Ok(entry) => {
                self.evict_anomaly(
                    month,
                    format!("entry belongs to {}", entry.month_key),
                );
                None
            }
            Err(e) => {
                self.evict_anomaly(month, e.to_string());
                None
            }
        }
    }

    fn evict_anomaly(&mut self, month: MonthKey, reason: String) {
        let anomaly = PlanningError::CacheAnomaly { month, reason };
        tracing::warn!(error = %anomaly, "Evicting unreadable cache entry");
        self.store.remove(&store_key(month));
    }

    fn write_entry(&mut self, entry: &CacheEntry) {
        match serde_json::to_value(entry) {
            Ok(value) => self.store.store(&store_key(entry.month_key), value),
            Err(e) => {
                tracing::error!(month = %entry.month_key, error = %e, "Failed to encode cache entry");
            }
        }
    }
}

fn store_key(month: MonthKey) -> String {
    format!("{KEY_PREFIX}{month}")
}
