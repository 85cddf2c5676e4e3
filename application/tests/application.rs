use application::Application;
use application::ports::PlanSource;
use async_trait::async_trait;
use billing::domain::bulk::OperationKind;
use billing::domain::cache::types;
use billing::events::CacheEvent;
use billing::ports::operation_fn;
use billing::{FailureCode, OperationError};
use serde_json::{Value, json};
use shared::config::{Config, RetrySettings};
use shared::{Error, TtlMs};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
struct FakePlans {
    fetches: AtomicU32,
    changes: AtomicU32,
    reject_changes: bool,
}

#[async_trait]
impl PlanSource for FakePlans {
    async fn fetch_user_plan(&self, user_id: &str) -> Result<Value, OperationError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "userId": user_id, "planId": "basic" }))
    }

    async fn change_plan(&self, user_id: &str, plan_id: &str) -> Result<Value, OperationError> {
        self.changes.fetch_add(1, Ordering::SeqCst);
        if self.reject_changes {
            return Err(OperationError::from_status(409, "plan change already pending", None));
        }
        Ok(json!({ "userId": user_id, "planId": plan_id, "pending": false }))
    }
}

fn config() -> Config {
    Config::from_lookup(|_| None)
}

fn build(plans: Arc<FakePlans>) -> Application {
    Application::from_config(&config(), plans, |admin| {
        admin.register(
            OperationKind::Deactivate,
            operation_fn(|code: String, options: Value| async move {
                if code.starts_with("bad") {
                    Err(OperationError::from_status(404, "code not found", None))
                } else {
                    let reason = options["reason"].clone();
                    Ok(json!({ "code": code, "active": false, "reason": reason }))
                }
            }),
        );
    })
    .unwrap()
}

fn codes(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_user_plan_is_read_through() {
    let plans = Arc::new(FakePlans::default());
    let app = build(plans.clone());

    let first = app.plans.user_plan("user-1").await.unwrap();
    let second = app.plans.user_plan("user-1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(plans.fetches.load(Ordering::SeqCst), 1);
    assert!(app.sweeper().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_change_plan_confirms_backend_value() {
    let plans = Arc::new(FakePlans::default());
    let app = build(plans.clone());
    app.plans.user_plan("user-1").await.unwrap();

    let confirmed = app.plans.change_plan("user-1", "pro").await.unwrap();

    assert_eq!(confirmed["planId"], json!("pro"));
    assert_eq!(
        app.cache_operations.get("user-1", types::USER_PLAN),
        Some(confirmed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_plan_change_rolls_back() {
    let plans = Arc::new(FakePlans {
        reject_changes: true,
        ..FakePlans::default()
    });
    let app = build(plans.clone());
    let before = app.plans.user_plan("user-1").await.unwrap();

    let failure = app.plans.change_plan("user-1", "pro").await.unwrap_err();

    assert_eq!(failure.code, FailureCode::ClientRejected);
    assert_eq!(plans.changes.load(Ordering::SeqCst), 1);
    assert_eq!(
        app.cache_operations.get("user-1", types::USER_PLAN),
        Some(before)
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_change_without_cached_plan_leaves_nothing() {
    let plans = Arc::new(FakePlans {
        reject_changes: true,
        ..FakePlans::default()
    });
    let app = build(plans);

    assert!(app.plans.change_plan("user-2", "pro").await.is_err());
    assert_eq!(app.cache_operations.get("user-2", types::USER_PLAN), None);
}

#[tokio::test(start_paused = true)]
async fn test_bulk_deactivate_invalidates_code_listings() {
    let app = build(Arc::new(FakePlans::default()));
    let mut events = app.subscribe();
    app.cache_operations
        .set("active-list", types::CODES, json!(["c1", "c2"]));
    app.cache_operations
        .set("dashboard", types::ANALYTICS, json!({ "redemptions": 4 }));

    let result = app
        .codes
        .deactivate(&codes(&["c1", "bad-9", "c2"]), "fraud")
        .await;

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed_ids(), vec!["bad-9"]);
    assert_eq!(result.results[0].target_id(), "c1");
    assert_eq!(app.cache_operations.get("active-list", types::CODES), None);
    assert!(
        app.cache_operations
            .get("dashboard", types::ANALYTICS)
            .is_some()
    );

    let mut saw_invalidation = false;
    while let Ok(event) = events.try_recv() {
        if let CacheEvent::TypeInvalidated(event) = event {
            assert_eq!(event.cache_type, types::CODES);
            assert_eq!(event.removed, 1);
            saw_invalidation = true;
        }
    }
    assert!(saw_invalidation);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_bulk_kind_keeps_cache() {
    let app = build(Arc::new(FakePlans::default()));
    app.cache_operations
        .set("active-list", types::CODES, json!(["c1"]));

    let result = app.codes.activate(&codes(&["c1"])).await;

    assert_eq!(result.failed, 1);
    assert!(
        app.cache_operations
            .get("active-list", types::CODES)
            .is_some()
    );
}

#[tokio::test]
async fn test_invalid_retry_settings_are_rejected() {
    let mut config = config();
    config.retry = RetrySettings {
        max_attempts: 0,
        ..RetrySettings::default()
    };

    let result = Application::from_config(&config, Arc::new(FakePlans::default()), |_| {});

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn test_configured_ttl_override_applies() {
    let mut config = config();
    config.cache.ttl_overrides = vec![(types::USER_PLAN.to_string(), TtlMs(1_000))];
    let plans = Arc::new(FakePlans::default());
    let app = Application::from_config(&config, plans.clone(), |_| {}).unwrap();

    app.plans.user_plan("user-1").await.unwrap();
    tokio::time::advance(std::time::Duration::from_millis(1_500)).await;
    app.plans.user_plan("user-1").await.unwrap();

    assert_eq!(plans.fetches.load(Ordering::SeqCst), 2);
}
