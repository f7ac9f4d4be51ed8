use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes `event`, logging instead of failing when the processor is gone.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "dropping domain event");
        }
    }
}

// Domain events published after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Identity
    UserRegistered(Uuid),
    UserStatusChanged { user_id: Uuid, active: bool },
    UserRoleChanged { user_id: Uuid, role: String },
    UserUpdated(Uuid),
    UserDeleted(Uuid),

    // Catalog
    MovieCreated(Uuid),
    MovieUpdated(Uuid),
    MovieDeleted(Uuid),

    // Coupons
    CouponCreated { coupon_id: Uuid, code: String },
    CouponUpdated(Uuid),
    CouponDeleted(Uuid),

    // Cart
    CartItemAdded { user_id: Uuid, movie_id: Uuid, quantity: i32 },
    CartItemUpdated { user_id: Uuid, movie_id: Uuid, quantity: i32 },
    CartItemRemoved { user_id: Uuid, movie_id: Uuid },
    CartCleared(Uuid),

    // Orders
    OrderPlaced {
        order_id: Uuid,
        user_id: Uuid,
        total: Decimal,
        coupon_code: Option<String>,
        placed_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserRegistered(_) => "user_registered",
            Event::UserStatusChanged { .. } => "user_status_changed",
            Event::UserRoleChanged { .. } => "user_role_changed",
            Event::UserUpdated(_) => "user_updated",
            Event::UserDeleted(_) => "user_deleted",
            Event::MovieCreated(_) => "movie_created",
            Event::MovieUpdated(_) => "movie_updated",
            Event::MovieDeleted(_) => "movie_deleted",
            Event::CouponCreated { .. } => "coupon_created",
            Event::CouponUpdated(_) => "coupon_updated",
            Event::CouponDeleted(_) => "coupon_deleted",
            Event::CartItemAdded { .. } => "cart_item_added",
            Event::CartItemUpdated { .. } => "cart_item_updated",
            Event::CartItemRemoved { .. } => "cart_item_removed",
            Event::CartCleared(_) => "cart_cleared",
            Event::OrderPlaced { .. } => "order_placed",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced {
                order_id,
                user_id,
                total,
                coupon_code,
                ..
            } => {
                info!(
                    event = event.name(),
                    %order_id,
                    %user_id,
                    %total,
                    coupon = coupon_code.as_deref().unwrap_or("-"),
                    "order placed"
                );
            }
            other => {
                info!(event = other.name(), payload = ?other, "domain event");
            }
        }
    }

    info!("Event processing loop stopped");
}
