// application/src/lib.rs
pub mod ports;
pub mod usecases;

use billing::events::CacheEvent;
use billing::planes::control::AdminOperationsService;
use billing::planes::data::CacheOperationsService;
use billing::retry::{RetryExecutor, RetryPolicy};
use ports::PlanSource;
use serde_json::Value;
use shared::config::Config;
use std::sync::Arc;
use storage_engine::{Sweeper, TtlCache};
use tokio::sync::broadcast;
use tracing::info;
use usecases::{CodeAdministration, PlanQueries};

/// Composition root: one cache per process, shared by every use case.
pub struct Application {
    pub cache: Arc<TtlCache<Value>>,
    pub cache_operations: CacheOperationsService<Value>,
    pub codes: CodeAdministration,
    pub plans: PlanQueries,
    events: broadcast::Sender<CacheEvent>,
    sweeper: Sweeper,
}

impl Application {
    const EVENT_BUFFER: usize = 256;

    /// Wires the cache, its sweeper and the use cases. `register` fills
    /// the admin dispatch table with the single-target network calls.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn from_config<F>(
        config: &Config,
        plan_source: Arc<dyn PlanSource>,
        register: F,
    ) -> shared::Result<Self>
    where
        F: FnOnce(&mut AdminOperationsService<Value>),
    {
        let executor = RetryExecutor::new(RetryPolicy::from_settings(&config.retry)?);

        let cache = Arc::new(TtlCache::from_settings(&config.cache));
        let sweeper = cache.spawn_sweeper(config.cache.sweep_interval.as_duration());

        let (events, _) = broadcast::channel(Self::EVENT_BUFFER);
        let cache_operations =
            CacheOperationsService::with_event_broadcaster(cache.clone(), events.clone());

        let mut admin = AdminOperationsService::new(executor.clone());
        register(&mut admin);
        info!(admin = ?admin, "admin operations registered");

        let codes = CodeAdministration::new(Arc::new(admin), cache_operations.clone());
        let plans = PlanQueries::new(plan_source, cache_operations.clone(), executor);

        Ok(Self {
            cache,
            cache_operations,
            codes,
            plans,
            events,
            sweeper,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }
}
