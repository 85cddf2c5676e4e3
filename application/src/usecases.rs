use crate::ports::PlanSource;
use billing::OperationFailure;
use billing::domain::bulk::{BulkOperationResult, OperationKind};
use billing::domain::cache::types;
use billing::planes::control::AdminOperations;
use billing::planes::data::CacheOperationsService;
use billing::retry::RetryExecutor;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bulk administration of redemption codes.
#[derive(Clone)]
pub struct CodeAdministration {
    admin: Arc<dyn AdminOperations<Value>>,
    cache: CacheOperationsService<Value>,
}

impl CodeAdministration {
    pub fn new(admin: Arc<dyn AdminOperations<Value>>, cache: CacheOperationsService<Value>) -> Self {
        Self { admin, cache }
    }

    /// Runs `kind` over `codes`. When anything changed, every cached
    /// `codes` read is stale and gets dropped.
    pub async fn bulk_apply(&self, codes: &[String], kind: &str, options: &Value) -> BulkOperationResult<Value> {
        let result = self.admin.bulk_operation(codes, kind, options).await;
        if result.successful > 0 {
            let removed = self.cache.invalidate_type(types::CODES);
            debug!(kind, removed, "invalidated cached code listings");
        }
        result
    }

    pub async fn activate(&self, codes: &[String]) -> BulkOperationResult<Value> {
        self.bulk_apply(codes, OperationKind::Activate.as_str(), &Value::Null)
            .await
    }

    pub async fn deactivate(&self, codes: &[String], reason: &str) -> BulkOperationResult<Value> {
        self.bulk_apply(
            codes,
            OperationKind::Deactivate.as_str(),
            &json!({ "reason": reason }),
        )
        .await
    }
}

/// Plan reads and plan changes for the subscription views.
#[derive(Clone)]
pub struct PlanQueries {
    source: Arc<dyn PlanSource>,
    cache: CacheOperationsService<Value>,
    executor: RetryExecutor,
}

impl PlanQueries {
    pub fn new(
        source: Arc<dyn PlanSource>,
        cache: CacheOperationsService<Value>,
        executor: RetryExecutor,
    ) -> Self {
        Self {
            source,
            cache,
            executor,
        }
    }

    /// Read-through under the `userPlan` type; failures are not cached.
    pub async fn user_plan(&self, user_id: &str) -> Result<Value, OperationFailure> {
        let source = self.source.as_ref();
        let executor = &self.executor;
        self.cache
            .with_cache(user_id, types::USER_PLAN, move || {
                executor.execute_with_retry("fetch_user_plan", move || source.fetch_user_plan(user_id))
            })
            .call()
            .await
    }

    /// Shows the new plan as pending right away and reverts the cached
    /// plan if the backend refuses or stays unavailable.
    pub async fn change_plan(&self, user_id: &str, plan_id: &str) -> Result<Value, OperationFailure> {
        let previous = self.cache.get(user_id, types::USER_PLAN);
        let update = self.cache.optimistic_update(
            user_id,
            types::USER_PLAN,
            |current| pending_plan(current, plan_id),
            previous,
        );

        let source = self.source.as_ref();
        let result = self
            .executor
            .execute_with_retry("change_plan", move || source.change_plan(user_id, plan_id))
            .await;

        match result {
            Ok(confirmed) => {
                self.cache.set(user_id, types::USER_PLAN, confirmed.clone());
                Ok(confirmed)
            }
            Err(failure) => {
                warn!(user_id, plan_id, code = %failure.code, "plan change failed, rolling back");
                update.rollback();
                Err(failure)
            }
        }
    }
}

fn pending_plan(current: Option<Value>, plan_id: &str) -> Value {
    let mut plan = match current {
        Some(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    plan.insert("planId".to_string(), Value::String(plan_id.to_string()));
    plan.insert("pending".to_string(), Value::Bool(true));
    Value::Object(plan)
}
