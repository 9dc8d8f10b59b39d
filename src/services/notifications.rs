use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::clock::{Clock, SystemClock};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::notification::{Notification, NotificationFilter, NotificationKind};
use crate::repositories::NotificationRepository;

/// Input for a new notification
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateNotificationInput {
    pub kind: NotificationKind,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[validate(length(max = 500))]
    pub link: Option<String>,
}

/// Per-user notification center.
///
/// Every operation is scoped to one user: a notification id that belongs to
/// someone else behaves exactly like an unknown id.
#[derive(Clone)]
pub struct NotificationService {
    repository: Arc<dyn NotificationRepository>,
    event_sender: Option<Arc<EventSender>>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            repository,
            event_sender,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[instrument(skip(self, input), fields(kind = %input.kind))]
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateNotificationInput,
    ) -> Result<Notification, ServiceError> {
        input.validate()?;

        let notification = self
            .repository
            .insert(Notification {
                id: Uuid::new_v4(),
                user_id,
                kind: input.kind,
                title: input.title.trim().to_string(),
                message: input.message,
                link: input.link.filter(|l| !l.trim().is_empty()),
                is_read: false,
                created_at: self.clock.now(),
            })
            .await?;

        info!(notification_id = %notification.id, "notification created");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::NotificationCreated {
                    notification_id: notification.id,
                    user_id,
                })
                .await;
        }

        Ok(notification)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, ServiceError> {
        self.repository.list(user_id, filter).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        self.repository.unread_count(user_id).await
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, ServiceError> {
        self.set_read(user_id, id, true).await
    }

    pub async fn mark_unread(&self, user_id: Uuid, id: Uuid) -> Result<Notification, ServiceError> {
        self.set_read(user_id, id, false).await
    }

    async fn set_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        is_read: bool,
    ) -> Result<Notification, ServiceError> {
        self.repository
            .set_read(user_id, id, is_read)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Notification {} not found", id)))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        self.repository.mark_all_read(user_id).await
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        if self.repository.delete(user_id, id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!(
                "Notification {} not found",
                id
            )))
        }
    }

    /// Removes every notification of the user, returning how many were removed
    pub async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        self.repository.clear(user_id).await
    }
}
