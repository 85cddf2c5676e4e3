#![deny(clippy::all)]

use crate::domain::cache::{CacheKey, CacheStats};
use crate::error::OperationError;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

// Ports are the pluggable extension points: the cache backend on the data
// plane and the per-target network calls on the control plane.

/// Port for key/type-scoped cache storage.
///
/// Operations are synchronous and never suspend; the most recent `set`
/// for a key wins.
pub trait CacheStore<V>: Send + Sync + 'static {
    /// Returns the value unless absent or expired. Expired entries are
    /// evicted on the way out.
    fn get(&self, key: &CacheKey) -> Option<V>;

    /// Inserts or overwrites, resetting the entry's age.
    fn set(&self, key: CacheKey, value: V);

    /// Returns whether an entry was removed.
    fn invalidate(&self, key: &CacheKey) -> bool;

    /// Removes every entry of `cache_type`, returning how many went.
    fn invalidate_type(&self, cache_type: &str) -> usize;

    fn clear(&self);

    fn stats(&self) -> CacheStats;
}

/// Port for a single-target admin call (activate, deactivate, update...).
///
/// Implementations classify transport failures into [`OperationError`]
/// and are expected to bound each attempt with their own timeout.
#[async_trait]
pub trait TargetOperation<R>: Send + Sync + 'static {
    async fn execute(&self, target_id: &str, options: &Value) -> Result<R, OperationError>;
}

/// Adapts an async closure into a [`TargetOperation`].
pub fn operation_fn<F>(f: F) -> FnOperation<F> {
    FnOperation { f }
}

#[derive(Clone)]
pub struct FnOperation<F> {
    f: F,
}

#[async_trait]
impl<R, F, Fut> TargetOperation<R> for FnOperation<F>
where
    R: Send + 'static,
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, OperationError>> + Send + 'static,
{
    async fn execute(&self, target_id: &str, options: &Value) -> Result<R, OperationError> {
        (self.f)(target_id.to_string(), options.clone()).await
    }
}
