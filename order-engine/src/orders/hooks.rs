//! Analytics / notification collaborator
//!
//! Hooks run after the owning transaction has committed. The lifecycle
//! service logs and swallows every [`HookError`]; a failing hook never fails
//! the operation that triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::order::Order;
use thiserror::Error;
use tokio::sync::broadcast;

/// Notification channel capacity
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HookError {
    #[error("Hook failed: {0}")]
    Failed(String),

    #[error("Hook unavailable: {0}")]
    Unavailable(String),
}

/// Order lifecycle callbacks
#[async_trait]
pub trait OrderHooks: Send + Sync {
    async fn on_order_created(&self, _order: &Order) -> Result<(), HookError> {
        Ok(())
    }

    /// `before` is `None` when no earlier snapshot was available
    async fn on_order_updated(
        &self,
        _order_id: &str,
        _before: Option<&Order>,
        _after: &Order,
    ) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_order_deleted(&self, _order: &Order) -> Result<(), HookError> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl OrderHooks for NoopHooks {}

/// Lifecycle notification published by [`BroadcastHooks`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderNotification {
    Created {
        order: Order,
    },
    Updated {
        order_id: String,
        before: Option<Order>,
        after: Order,
    },
    Deleted {
        order: Order,
    },
}

impl OrderNotification {
    pub fn order_id(&self) -> &str {
        match self {
            OrderNotification::Created { order } | OrderNotification::Deleted { order } => &order.id,
            OrderNotification::Updated { order_id, .. } => order_id,
        }
    }
}

/// Publishes every lifecycle event on a tokio broadcast channel
///
/// Nobody listening is not an error; the event is dropped with a debug log.
#[derive(Debug, Clone)]
pub struct BroadcastHooks {
    tx: broadcast::Sender<OrderNotification>,
}

impl Default for BroadcastHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHooks {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to lifecycle notifications
    pub fn subscribe(&self) -> broadcast::Receiver<OrderNotification> {
        self.tx.subscribe()
    }

    fn publish(&self, notification: OrderNotification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Order notification dropped: no active receivers");
        }
    }
}

#[async_trait]
impl OrderHooks for BroadcastHooks {
    async fn on_order_created(&self, order: &Order) -> Result<(), HookError> {
        self.publish(OrderNotification::Created {
            order: order.clone(),
        });
        Ok(())
    }

    async fn on_order_updated(
        &self,
        order_id: &str,
        before: Option<&Order>,
        after: &Order,
    ) -> Result<(), HookError> {
        self.publish(OrderNotification::Updated {
            order_id: order_id.to_string(),
            before: before.cloned(),
            after: after.clone(),
        });
        Ok(())
    }

    async fn on_order_deleted(&self, order: &Order) -> Result<(), HookError> {
        self.publish(OrderNotification::Deleted {
            order: order.clone(),
        });
        Ok(())
    }
}
