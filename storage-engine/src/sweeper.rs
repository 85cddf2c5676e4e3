use crate::ttl_cache::TtlCache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// Handle to the background task that periodically evicts expired
/// entries. Dropping the handle stops the task.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub(crate) fn spawn<V>(cache: &Arc<TtlCache<V>>, every: Duration) -> Self
    where
        V: Clone + Serialize + Send + Sync + 'static,
    {
        // tokio's interval rejects a zero period
        let every = every.max(Duration::from_millis(1));
        let cache = Arc::downgrade(cache);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("cache dropped, stopping sweeper");
                    break;
                };
                cache.sweep_expired();
            }
        });

        debug!(interval_ms = every.as_millis() as u64, "cache sweeper started");
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
