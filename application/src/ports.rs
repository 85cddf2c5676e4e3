// application/src/ports.rs
use async_trait::async_trait;
use billing::OperationError;
use serde_json::Value;

/// Backend calls behind the plan views. Implementations map transport
/// failures to [`OperationError`].
#[async_trait]
pub trait PlanSource: Send + Sync + 'static {
    async fn fetch_user_plan(&self, user_id: &str) -> Result<Value, OperationError>;

    async fn change_plan(&self, user_id: &str, plan_id: &str) -> Result<Value, OperationError>;
}
