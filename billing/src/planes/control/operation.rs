use async_trait::async_trait;
use serde_json::Value;

use crate::domain::bulk::BulkOperationResult;

/// Admin-side bulk mutations over independent targets.
#[async_trait]
pub trait AdminOperations<R>: Send + Sync + 'static {
    /// Applies `kind` to every target and reports each outcome in input
    /// order. Individual failures never abort the batch.
    async fn bulk_operation(
        &self,
        target_ids: &[String],
        kind: &str,
        options: &Value,
    ) -> BulkOperationResult<R>;

    fn supports(&self, kind: &str) -> bool;
}
