use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::notification::NotificationKind;
use crate::services::notifications::{CreateNotificationInput, NotificationService};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving end of the channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the processor is gone.
    /// Business operations never fail because an event could not be published.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

/// Domain events published by the coupon and notification services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CouponCreated {
        coupon_id: i64,
        code: String,
    },
    CouponUpdated {
        coupon_id: i64,
    },
    CouponDeleted {
        coupon_id: i64,
        code: String,
    },
    CouponRedeemed {
        coupon_id: i64,
        code: String,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
        redeemed_at: DateTime<Utc>,
    },
    CouponRedemptionReleased {
        coupon_id: i64,
        order_id: Uuid,
    },
    NotificationCreated {
        notification_id: Uuid,
        user_id: Uuid,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::CouponCreated { .. } => "coupon_created",
            Event::CouponUpdated { .. } => "coupon_updated",
            Event::CouponDeleted { .. } => "coupon_deleted",
            Event::CouponRedeemed { .. } => "coupon_redeemed",
            Event::CouponRedemptionReleased { .. } => "coupon_redemption_released",
            Event::NotificationCreated { .. } => "notification_created",
        }
    }
}

/// Consumes events until every sender is dropped.
///
/// A redeemed coupon produces a `coupon` notification for the buyer.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifications: Arc<NotificationService>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("marketplace_events_processed_total", 1, "event" => event.name());

        match event {
            Event::CouponRedeemed {
                code,
                user_id,
                order_id,
                discount_amount,
                ..
            } => {
                if let Err(e) =
                    handle_coupon_redeemed(&notifications, &code, user_id, order_id, discount_amount)
                        .await
                {
                    error!(
                        "Failed to handle coupon redeemed event: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::CouponRedemptionReleased {
                coupon_id,
                order_id,
            } => {
                info!(coupon_id, %order_id, "coupon redemption released");
            }
            other => {
                info!("No specific handler for event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}

async fn handle_coupon_redeemed(
    notifications: &NotificationService,
    code: &str,
    user_id: Uuid,
    order_id: Uuid,
    discount_amount: Decimal,
) -> Result<(), String> {
    notifications
        .create(
            user_id,
            CreateNotificationInput {
                kind: NotificationKind::Coupon,
                title: format!("Coupon {} applied", code),
                message: format!(
                    "You saved {} on order {}",
                    crate::services::coupons::calculator::round_currency(discount_amount),
                    order_id
                ),
                link: Some(format!("/orders/{}", order_id)),
            },
        )
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}
