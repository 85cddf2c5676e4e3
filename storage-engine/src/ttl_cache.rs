use billing::domain::cache::{CacheKey, CacheStats, TtlTable};
use billing::ports::CacheStore;
use dashmap::DashMap;
use serde::Serialize;
use shared::config::CacheSettings;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::sweeper::Sweeper;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl.is_zero() || now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// In-memory cache keyed by (identifier, type), each type with its own
/// expiration window.
///
/// Expired entries are removed lazily on `get` or eagerly by
/// [`TtlCache::sweep_expired`]; there is no capacity bound. Time is read
/// from `tokio::time`, so a paused test clock drives expiry.
pub struct TtlCache<V> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    ttl_table: TtlTable,
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    pub fn new(ttl_table: TtlTable) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_table,
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(TtlTable::from_settings(settings))
    }

    pub fn ttl_table(&self) -> &TtlTable {
        &self.ttl_table
    }

    /// Whether a live (unexpired) entry exists. Does not evict.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Entries physically held, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts every expired entry and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                evicted += 1;
                false
            } else {
                true
            }
        });
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "swept expired cache entries");
        }
        evicted
    }

    /// Starts the periodic sweep. The task stops when the returned handle
    /// or the cache itself is dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> Sweeper {
        Sweeper::spawn(self, interval)
    }
}

impl<V> CacheStore<V> for TtlCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            // A concurrent set may have refreshed the entry since the read.
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            debug!(key = %key, "evicted expired entry on read");
        }
        None
    }

    fn set(&self, key: CacheKey, value: V) {
        let ttl = self.ttl_table.resolve(key.cache_type());
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    fn invalidate_type(&self, cache_type: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            if key.cache_type() == cache_type {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn stats(&self) -> CacheStats {
        let mut entries_by_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut approximate_memory_bytes = 0;

        for entry in self.entries.iter() {
            let key = entry.key();
            *entries_by_type
                .entry(key.cache_type().to_string())
                .or_default() += 1;
            let value_bytes = serde_json::to_vec(&entry.value().value)
                .map(|bytes| bytes.len())
                .unwrap_or(0);
            approximate_memory_bytes +=
                key.identifier().len() + key.cache_type().len() + value_bytes;
        }

        CacheStats {
            total_entries: entries_by_type.values().sum(),
            entries_by_type,
            approximate_memory_bytes,
        }
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(TtlTable::builtin())
    }
}

impl<V> Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entry_count", &self.entries.len())
            .field("default_ttl", &self.ttl_table.default_ttl())
            .finish()
    }
}
