use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Coupon,
    Account,
    Promotion,
    System,
}

/// A message shown in a user's notification center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Criteria for listing a user's notifications. All set criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotificationFilter {
    pub kind: Option<NotificationKind>,
    #[serde(default)]
    pub unread_only: bool,
    pub search: Option<String>,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        if let Some(kind) = self.kind {
            if notification.kind != kind {
                return false;
            }
        }
        if self.unread_only && notification.is_read {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                notification.title.to_lowercase().contains(&term)
                    || notification.message.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}
