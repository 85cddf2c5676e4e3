use crate::domain::bulk::{BulkOperationResult, TargetOutcome};
use crate::error::OperationFailure;
use crate::planes::control::AdminOperations;
use crate::ports::TargetOperation;
use crate::retry::RetryExecutor;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{info, warn};

/// Dispatches admin operations by kind and fans them out over targets.
///
/// Every target runs its own retry sequence through the shared
/// [`RetryExecutor`]; the per-target futures are polled concurrently and
/// joined, so `results` keeps the position of each input target.
pub struct AdminOperationsService<R> {
    // Maps operation kind -> single-target network call
    operations: HashMap<String, Arc<dyn TargetOperation<R>>>,
    executor: RetryExecutor,
}

impl<R> Debug for AdminOperationsService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("AdminOperationsService")
            .field("operations", &kinds)
            .field("executor", &self.executor)
            .finish()
    }
}

impl<R> AdminOperationsService<R>
where
    R: Send + 'static,
{
    pub fn new(executor: RetryExecutor) -> Self {
        Self {
            operations: HashMap::new(),
            executor,
        }
    }

    /// Registers (or replaces) the operation behind `kind`.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        operation: impl TargetOperation<R>,
    ) -> &mut Self {
        self.operations.insert(kind.into(), Arc::new(operation));
        self
    }

    pub fn with_operation(mut self, kind: impl Into<String>, operation: impl TargetOperation<R>) -> Self {
        self.register(kind, operation);
        self
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    async fn run_target(
        &self,
        operation: &dyn TargetOperation<R>,
        kind: &str,
        target_id: &str,
        options: &Value,
    ) -> TargetOutcome<R> {
        let result = self
            .executor
            .execute_with_retry(kind, move || operation.execute(target_id, options))
            .await;

        match result {
            Ok(value) => TargetOutcome::Succeeded {
                target_id: target_id.to_string(),
                value,
            },
            Err(error) => {
                warn!(target_id, kind, code = %error.code, "bulk target failed");
                TargetOutcome::Failed {
                    target_id: target_id.to_string(),
                    error,
                }
            }
        }
    }
}

#[async_trait]
impl<R> AdminOperations<R> for AdminOperationsService<R>
where
    R: Send + Sync + 'static,
{
    async fn bulk_operation(
        &self,
        target_ids: &[String],
        kind: &str,
        options: &Value,
    ) -> BulkOperationResult<R> {
        let Some(operation) = self.operations.get(kind) else {
            warn!(kind, targets = target_ids.len(), "unsupported bulk operation");
            return BulkOperationResult::from_outcomes(
                target_ids
                    .iter()
                    .map(|target_id| TargetOutcome::Failed {
                        target_id: target_id.clone(),
                        error: OperationFailure::unsupported(kind),
                    })
                    .collect(),
            );
        };
        let operation: &dyn TargetOperation<R> = operation.as_ref();

        let outcomes = join_all(
            target_ids
                .iter()
                .map(|target_id| self.run_target(operation, kind, target_id, options)),
        )
        .await;

        let result = BulkOperationResult::from_outcomes(outcomes);
        info!(
            kind,
            total = result.total,
            successful = result.successful,
            failed = result.failed,
            "bulk operation finished"
        );
        result
    }

    fn supports(&self, kind: &str) -> bool {
        self.operations.contains_key(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bulk::OperationKind;
    use crate::error::{FailureCode, OperationError};
    use crate::ports::operation_fn;
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    fn executor() -> RetryExecutor {
        RetryExecutor::new(
            RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1), 0.1).unwrap(),
        )
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_preserves_order_and_isolates_failures() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let completed_clone = completed.clone();
        let service = AdminOperationsService::new(executor()).with_operation(
            OperationKind::Deactivate,
            operation_fn(move |target_id: String, _options: Value| {
                let completed = completed_clone.clone();
                async move {
                    // "a" finishes last so completion order differs from input order
                    let delay = if target_id == "a" { 500 } else { 10 };
                    sleep(Duration::from_millis(delay)).await;
                    completed.lock().unwrap().push(target_id.clone());
                    if target_id == "b" {
                        Err(OperationError::from_status(500, "ledger unavailable", None))
                    } else {
                        Ok(json!({ "code": target_id, "active": false }))
                    }
                }
            }),
        );

        let result = service
            .bulk_operation(&ids(&["a", "b", "c"]), "deactivate", &json!({}))
            .await;

        assert_eq!(result.total, 3);
        assert_eq!(result.successful, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.results[0].target_id(), "a");
        assert_eq!(result.results[1].target_id(), "b");
        assert_eq!(result.results[2].target_id(), "c");
        assert!(result.results[0].is_success());
        assert!(!result.results[1].is_success());
        assert!(result.results[2].is_success());
        assert_eq!(result.failed_ids(), vec!["b"]);

        match &result.results[1] {
            TargetOutcome::Failed { error, .. } => {
                assert_eq!(error.code, FailureCode::RetriesExhausted);
                assert_eq!(error.attempts, 3);
            }
            other => panic!("expected failure, got {other:?}"),
        }

        // "b" retried twice; "a" completed after everything else.
        let completed = completed.lock().unwrap();
        assert_eq!(completed.len(), 5);
        assert_eq!(completed.last().map(String::as_str), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_kind_fails_fast_without_calls() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let service = AdminOperationsService::new(executor()).with_operation(
            OperationKind::Activate,
            operation_fn(move |_target_id: String, _options: Value| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, OperationError>(()) }
            }),
        );

        let result = service
            .bulk_operation(&ids(&["a"]), "explode", &Value::Null)
            .await;

        assert_eq!(result.total, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!service.supports("explode"));
        match &result.results[0] {
            TargetOutcome::Failed { error, target_id } => {
                assert_eq!(target_id, "a");
                assert_eq!(error.code, FailureCode::Unsupported);
                assert_eq!(error.attempts, 0);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_captured_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let service = AdminOperationsService::new(executor()).with_operation(
            OperationKind::Update,
            operation_fn(move |target_id: String, _options: Value| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if target_id == "expired" {
                        Err(OperationError::from_status(422, "code already expired", None))
                    } else {
                        Ok(target_id)
                    }
                }
            }),
        );

        let result = service
            .bulk_operation(&ids(&["fresh", "expired"]), "update", &json!({ "maxUses": 10 }))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.successful, 1);
        match &result.results[1] {
            TargetOutcome::Failed { error, .. } => {
                assert_eq!(error.code, FailureCode::ClientRejected);
                assert_eq!(error.http_status, Some(422));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_targets_run_concurrently() {
        let service = AdminOperationsService::new(executor()).with_operation(
            OperationKind::Activate,
            operation_fn(|_target_id: String, _options: Value| async {
                sleep(Duration::from_secs(1)).await;
                Ok::<_, OperationError>(())
            }),
        );

        let start = Instant::now();
        let result = service
            .bulk_operation(&ids(&["a", "b", "c", "d"]), "activate", &Value::Null)
            .await;

        assert!(result.is_complete_success());
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_options_reach_each_target() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let service = AdminOperationsService::new(executor()).with_operation(
            "extend",
            operation_fn(move |target_id: String, options: Value| {
                let seen = seen_clone.clone();
                async move {
                    seen.lock().unwrap().push((target_id, options["days"].clone()));
                    Ok::<_, OperationError>(())
                }
            }),
        );

        let result = service
            .bulk_operation(&ids(&["x", "y"]), "extend", &json!({ "days": 30 }))
            .await;

        assert!(service.supports("extend"));
        assert_eq!(result.successful, 2);
        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|(_, days)| *days == json!(30)));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let service: AdminOperationsService<()> = AdminOperationsService::new(executor());
        let result = service
            .bulk_operation(&[], "activate", &Value::Null)
            .await;
        assert_eq!(result.total, 0);
        assert!(result.is_complete_success());
    }
}
