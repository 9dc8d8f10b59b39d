#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use marketplace_api::{
    build_router,
    clock::FixedClock,
    config::AppConfig,
    events::{self, EventSender},
    handlers::{AppServices, Repositories},
    services::notifications::NotificationService,
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

/// Instant every test application considers "now"
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

/// Helper harness for an application backed by in-memory repositories and a fixed clock.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.repository_backend = "in-memory".to_string();
        cfg.api_default_page_size = 10;
        cfg.api_max_page_size = 50;

        let repositories = Repositories::in_memory();
        let (event_sender, event_rx) = EventSender::channel(256);
        let event_sender = Arc::new(event_sender);
        let clock = Arc::new(FixedClock::at(test_now()));

        let processor_notifications = Arc::new(
            NotificationService::new(repositories.notifications.clone(), None)
                .with_clock(clock.clone()),
        );
        let event_task = tokio::spawn(events::process_events(event_rx, processor_notifications));

        let services = AppServices::from_config(&cfg, &repositories, event_sender, clock);
        let state = AppState {
            config: Arc::new(cfg),
            services,
            db: None,
        };

        Self {
            router: build_router(state.clone()),
            state,
            _event_task: event_task,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and returns the status with the decoded JSON body (`Null` when empty).
    pub async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is not json")
        };
        (status, value)
    }

    /// Creates a coupon through the admin API and returns its `data` object.
    pub async fn create_coupon(&self, body: Value) -> Value {
        let (status, payload) = self
            .json(Method::POST, "/api/v1/admin/coupons", Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {payload}");
        payload["data"].clone()
    }

    /// Waits until the event processor has caught up with `predicate`.
    pub async fn eventually<F, Fut>(&self, mut predicate: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..50 {
            if predicate().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Order context JSON for `user_id` with a single line item
pub fn cart(user_id: Uuid, total: &str) -> Value {
    json!({
        "cart_total": total,
        "user_id": user_id,
        "items": [{
            "product_id": Uuid::new_v4(),
            "quantity": 1,
            "price": total,
            "category": "Electronics",
        }],
    })
}

/// Reads a decimal that the API serialized as a string
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("expected decimal string, got {value}"))
}
