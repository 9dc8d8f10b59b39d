use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{created_response, map_service_error, no_content_response, paged_response, validate_input};
use crate::{
    errors::{ApiError, ServiceError},
    models::notification::{Notification, NotificationFilter, NotificationKind},
    services::{notifications::CreateNotificationInput, Paged, PageRequest},
    ApiResponse, ApiResult, AppState,
};

/// Query string of the notification listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationListQuery {
    pub kind: Option<NotificationKind>,
    pub unread_only: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl NotificationListQuery {
    fn filter(&self) -> NotificationFilter {
        NotificationFilter {
            kind: self.kind,
            unread_only: self.unread_only.unwrap_or(false),
            search: self.search.clone(),
        }
    }

    fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread_count: u64,
}

/// Number of notifications changed by a bulk operation
#[derive(Debug, Serialize, Deserialize)]
pub struct AffectedCount {
    pub affected: u64,
}

async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Response, ServiceError> {
    let all = state
        .services
        .notifications
        .list(user_id, &query.filter())
        .await?;
    let (page, per_page) = state.services.page_limits.resolve(query.page_request());
    Ok(paged_response(Paged::from_all(all, page, per_page)))
}

async fn create_notification(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<CreateNotificationInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let created = state
        .services
        .notifications
        .create(user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(created))
}

async fn unread_count(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<UnreadCount> {
    let unread_count = state.services.notifications.unread_count(user_id).await?;
    Ok(Json(ApiResponse::success(UnreadCount { unread_count })))
}

async fn mark_read(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Notification> {
    let notification = state.services.notifications.mark_read(user_id, id).await?;
    Ok(Json(ApiResponse::success(notification)))
}

async fn mark_unread(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Notification> {
    let notification = state.services.notifications.mark_unread(user_id, id).await?;
    Ok(Json(ApiResponse::success(notification)))
}

async fn mark_all_read(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<AffectedCount> {
    let affected = state.services.notifications.mark_all_read(user_id).await?;
    Ok(Json(ApiResponse::success(AffectedCount { affected })))
}

async fn delete_notification(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    state.services.notifications.delete(user_id, id).await?;
    Ok(no_content_response())
}

async fn clear_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<AffectedCount> {
    let affected = state.services.notifications.clear(user_id).await?;
    Ok(Json(ApiResponse::success(AffectedCount { affected })))
}

/// Per-user notification center routes
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/:user_id/notifications",
            get(list_notifications)
                .post(create_notification)
                .delete(clear_notifications),
        )
        .route(
            "/users/:user_id/notifications/unread-count",
            get(unread_count),
        )
        .route(
            "/users/:user_id/notifications/read-all",
            post(mark_all_read),
        )
        .route(
            "/users/:user_id/notifications/:id",
            axum::routing::delete(delete_notification),
        )
        .route("/users/:user_id/notifications/:id/read", post(mark_read))
        .route("/users/:user_id/notifications/:id/unread", post(mark_unread))
}
