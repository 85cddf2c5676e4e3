use crate::domain::cache::{CacheKey, CacheStats};
use crate::events::{CacheEvent, ClearedEvent, EntryEvent, TypeInvalidatedEvent, now_timestamp_ms};
use crate::ports::CacheStore;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Data-plane service over a [`CacheStore`]: plain reads and writes,
/// read-through wrapping and optimistic updates with rollback.
///
/// Cloning is cheap; clones share the same store and broadcaster.
pub struct CacheOperationsService<V> {
    store: Arc<dyn CacheStore<V>>,
    event_broadcaster: Option<broadcast::Sender<CacheEvent>>,
}

impl<V> Clone for CacheOperationsService<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            event_broadcaster: self.event_broadcaster.clone(),
        }
    }
}

impl<V> Debug for CacheOperationsService<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOperationsService")
            .field("store", &"<dyn CacheStore>")
            .field("events", &self.event_broadcaster.is_some())
            .finish()
    }
}

impl<V> CacheOperationsService<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn CacheStore<V>>) -> Self {
        Self {
            store,
            event_broadcaster: None,
        }
    }

    pub fn with_event_broadcaster(
        store: Arc<dyn CacheStore<V>>,
        broadcaster: broadcast::Sender<CacheEvent>,
    ) -> Self {
        Self {
            store,
            event_broadcaster: Some(broadcaster),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore<V>> {
        &self.store
    }

    pub fn get(&self, identifier: &str, cache_type: &str) -> Option<V> {
        self.store.get(&CacheKey::new(identifier, cache_type))
    }

    pub fn set(&self, identifier: &str, cache_type: &str, value: V) {
        let key = CacheKey::new(identifier, cache_type);
        let event = CacheEvent::Stored(EntryEvent::for_key(&key));
        self.store.set(key, value);
        self.publish(event);
    }

    pub fn invalidate(&self, identifier: &str, cache_type: &str) -> bool {
        let key = CacheKey::new(identifier, cache_type);
        let removed = self.store.invalidate(&key);
        if removed {
            self.publish(CacheEvent::Invalidated(EntryEvent::for_key(&key)));
        }
        removed
    }

    /// Drops a whole category, typically after a mutation that affects
    /// every cached read of that type.
    pub fn invalidate_type(&self, cache_type: &str) -> usize {
        let removed = self.store.invalidate_type(cache_type);
        debug!(cache_type, removed, "invalidated cache type");
        self.publish(CacheEvent::TypeInvalidated(TypeInvalidatedEvent {
            cache_type: cache_type.to_string(),
            removed,
            timestamp_ms: now_timestamp_ms(),
        }));
        removed
    }

    pub fn clear(&self) {
        self.store.clear();
        self.publish(CacheEvent::Cleared(ClearedEvent {
            timestamp_ms: now_timestamp_ms(),
        }));
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Wraps `operation` in a read-through cache under `(identifier, cache_type)`.
    ///
    /// Concurrent misses are not coalesced: two callers that both miss will
    /// both run `operation`, and the last one to finish wins the slot.
    pub fn with_cache<F, Fut, E>(
        &self,
        identifier: &str,
        cache_type: &str,
        operation: F,
    ) -> CachedOperation<V, F>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        CachedOperation {
            service: self.clone(),
            key: CacheKey::new(identifier, cache_type),
            operation,
        }
    }

    /// Writes `update(current)` immediately, where `current` is the cached
    /// value or, when nothing is cached, `rollback_value`.
    ///
    /// The returned handle restores `rollback_value` (or removes the entry
    /// when it is `None`) regardless of writes made in between.
    pub fn optimistic_update<F>(
        &self,
        identifier: &str,
        cache_type: &str,
        update: F,
        rollback_value: Option<V>,
    ) -> OptimisticUpdate<V>
    where
        F: FnOnce(Option<V>) -> V,
    {
        let key = CacheKey::new(identifier, cache_type);
        let current = self.store.get(&key).or_else(|| rollback_value.clone());
        let value = update(current);

        self.store.set(key.clone(), value.clone());
        debug!(key = %key, "applied optimistic update");
        self.publish(CacheEvent::Stored(EntryEvent::for_key(&key)));

        OptimisticUpdate {
            value,
            rollback: RollbackHandle {
                service: self.clone(),
                key,
                snapshot: rollback_value,
            },
        }
    }

    fn publish(&self, event: CacheEvent) {
        if let Some(ref broadcaster) = self.event_broadcaster {
            match broadcaster.send(event) {
                Ok(subscriber_count) => {
                    debug!("Broadcasted cache event to {} subscriber(s)", subscriber_count);
                }
                Err(_) => {
                    debug!("No subscribers for cache event");
                }
            }
        }
    }
}

/// A read-through wrapper returned by [`CacheOperationsService::with_cache`].
pub struct CachedOperation<V, F> {
    service: CacheOperationsService<V>,
    key: CacheKey,
    operation: F,
}

impl<V, F, Fut, E> CachedOperation<V, F>
where
    V: Clone + Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    /// Returns the cached value on a hit. On a miss runs the operation and
    /// caches a successful result; errors are returned and never cached.
    pub async fn call(&self) -> Result<V, E> {
        if let Some(value) = self.service.store.get(&self.key) {
            debug!(key = %self.key, "cache hit");
            return Ok(value);
        }

        debug!(key = %self.key, "cache miss");
        let value = (self.operation)().await?;
        self.service.store.set(self.key.clone(), value.clone());
        self.service
            .publish(CacheEvent::Stored(EntryEvent::for_key(&self.key)));
        Ok(value)
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

/// The speculative value plus the capability to undo it.
pub struct OptimisticUpdate<V> {
    pub value: V,
    pub rollback: RollbackHandle<V>,
}

impl<V> OptimisticUpdate<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn rollback(&self) {
        self.rollback.rollback();
    }

    pub fn into_parts(self) -> (V, RollbackHandle<V>) {
        (self.value, self.rollback)
    }
}

/// Restores the snapshot captured at optimistic-update time. Calling it
/// more than once rewrites the same snapshot.
pub struct RollbackHandle<V> {
    service: CacheOperationsService<V>,
    key: CacheKey,
    snapshot: Option<V>,
}

impl<V> RollbackHandle<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn rollback(&self) {
        match &self.snapshot {
            Some(value) => self.service.store.set(self.key.clone(), value.clone()),
            None => {
                self.service.store.invalidate(&self.key);
            }
        }
        debug!(key = %self.key, "rolled back optimistic update");
        self.service
            .publish(CacheEvent::RolledBack(EntryEvent::for_key(&self.key)));
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}
