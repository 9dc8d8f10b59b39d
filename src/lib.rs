//! Marketplace API library
//!
//! Coupon validation and discount engine, coupon administration, redemption
//! and per-user notifications behind an axum JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod clock;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{http::HeaderValue, middleware, response::Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
    /// Present when coupons are stored in a database
    pub db: Option<Arc<DatabaseConnection>>,
}

/// Envelope of every successful JSON body
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> From<services::Paged<T>> for PaginatedResponse<T> {
    fn from(paged: services::Paged<T>) -> Self {
        let total_pages = paged.total_pages();
        Self {
            items: paged.items,
            total: paged.total,
            page: paged.page,
            per_page: paged.per_page,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_envelope_carries_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        assert!(response.success);
        assert!(response.errors.is_none());
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn envelope_outside_a_request_has_no_request_id() {
        let body = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(body["data"], 1);
        assert!(body["meta"].get("request_id").is_none());
    }

    #[test]
    fn paginated_response_carries_page_count() {
        let paged = services::Paged::from_all((1..=45).collect::<Vec<u32>>(), 3, 20);
        let response = PaginatedResponse::from(paged);

        assert_eq!(response.items, (41..=45).collect::<Vec<u32>>());
        assert_eq!(response.total, 45);
        assert_eq!(response.page, 3);
        assert_eq!(response.per_page, 20);
        assert_eq!(response.total_pages, 3);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every route mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::coupons::coupon_routes())
        .merge(handlers::admin_coupons::admin_coupon_routes())
        .merge(handlers::notifications::notification_routes())
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        if cfg.is_production() {
            ::tracing::warn!("No CORS origins configured in production; allowing any origin");
        } else {
            ::tracing::info!("Using permissive CORS because explicit origins were not configured");
        }
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Full application router: health, the v1 API and the HTTP middleware stack
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .layer(TimeoutLayer::new(timeout))
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        .layer(middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
