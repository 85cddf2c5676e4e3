use application::Application;
use application::ports::PlanSource;
use async_trait::async_trait;
use billing::OperationError;
use billing::domain::bulk::OperationKind;
use billing::ports::operation_fn;
use rand::Rng;
use serde_json::{Value, json};
use shared::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct StaticPlans;

#[async_trait]
impl PlanSource for StaticPlans {
    async fn fetch_user_plan(&self, user_id: &str) -> Result<Value, OperationError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(json!({ "userId": user_id, "planId": "basic" }))
    }

    async fn change_plan(&self, _user_id: &str, _plan_id: &str) -> Result<Value, OperationError> {
        Err(OperationError::from_status(503, "billing backend in maintenance", None))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();
    let app = Application::from_config(&config, Arc::new(StaticPlans), |admin| {
        admin.register(
            OperationKind::Deactivate,
            operation_fn(|code: String, _options: Value| async move {
                // Flaky backend: roughly a third of the calls hit a 503
                let roll: f64 = rand::rng().random();
                tokio::time::sleep(Duration::from_millis(20)).await;
                if code.starts_with("gone") {
                    Err(OperationError::from_status(404, "unknown code", None))
                } else if roll < 0.33 {
                    Err(OperationError::from_status(503, "upstream busy", None))
                } else {
                    Ok(json!({ "code": code, "active": false }))
                }
            }),
        );
    })?;

    println!("\n=== Read-through plan lookup ===");
    let plan = app.plans.user_plan("user-42").await?;
    println!("First read: {plan}");
    let plan = app.plans.user_plan("user-42").await?;
    println!("Second read (cached): {plan}");

    println!("\n=== Optimistic plan change ===");
    match app.plans.change_plan("user-42", "pro").await {
        Ok(plan) => println!("Plan changed: {plan}"),
        Err(failure) => println!("Plan change failed ({failure}), cached plan restored"),
    }

    println!("\n=== Bulk deactivate ===");
    let codes: Vec<String> = ["SPRING24", "gone-001", "WELCOME10", "VIP50"]
        .iter()
        .map(|code| code.to_string())
        .collect();
    let result = app.codes.deactivate(&codes, "campaign ended").await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    println!("\n=== Cache stats ===");
    println!("{}", serde_json::to_string_pretty(&app.cache_operations.stats())?);

    Ok(())
}
