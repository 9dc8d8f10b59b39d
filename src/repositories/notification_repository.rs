use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::notification::{Notification, NotificationFilter};

use super::NotificationRepository;

/// Notifications kept per user in process memory
#[derive(Debug, Default)]
pub struct InMemoryNotificationRepository {
    by_user: DashMap<Uuid, Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, notification: Notification) -> Result<Notification, ServiceError> {
        self.by_user
            .entry(notification.user_id)
            .or_default()
            .push(notification.clone());
        Ok(notification)
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, ServiceError> {
        let mut items: Vec<Notification> = self
            .by_user
            .get(&user_id)
            .map(|list| {
                list.iter()
                    .filter(|n| filter.matches(n))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Stable sort keeps insertion order reversed for equal timestamps
        items.reverse();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        Ok(self
            .by_user
            .get(&user_id)
            .map(|list| list.iter().filter(|n| !n.is_read).count() as u64)
            .unwrap_or(0))
    }

    async fn set_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        is_read: bool,
    ) -> Result<Option<Notification>, ServiceError> {
        let Some(mut list) = self.by_user.get_mut(&user_id) else {
            return Ok(None);
        };
        Ok(list.iter_mut().find(|n| n.id == id).map(|n| {
            n.is_read = is_read;
            n.clone()
        }))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let Some(mut list) = self.by_user.get_mut(&user_id) else {
            return Ok(0);
        };
        let mut changed = 0;
        for notification in list.iter_mut().filter(|n| !n.is_read) {
            notification.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, ServiceError> {
        let Some(mut list) = self.by_user.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|n| n.id != id);
        Ok(list.len() < before)
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        Ok(self
            .by_user
            .remove(&user_id)
            .map(|(_, list)| list.len() as u64)
            .unwrap_or(0))
    }
}
