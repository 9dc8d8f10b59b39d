//! Request correlation for logs and error bodies.
//!
//! A request id is scoped into a task-local for the lifetime of each HTTP
//! request so that error responses and response metadata can report it without
//! threading it through every handler signature.

use std::cell::RefCell;
use std::future::Future;

use axum::{body::Body, http::Request};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{DefaultOnResponse, MakeSpan, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Request ID tracking information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// Builds request spans carrying method, path and the request id set by
/// [`crate::middleware_helpers::request_id::request_id_middleware`].
#[derive(Clone, Default)]
pub struct RequestSpanMaker;

impl MakeSpan<Body> for RequestSpanMaker {
    fn make_span(&mut self, request: &Request<Body>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|rid| rid.as_str().to_string())
            .unwrap_or_default();

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
        )
    }
}

/// HTTP tracing layer used by the router
pub fn configure_http_tracing(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpanMaker> {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpanMaker)
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}
