//! Order / order-item status vocabulary
//!
//! Status values are persisted lowercase-normalized (`orderreceived`) and
//! displayed in their canonical camel form (`orderReceived`). Legacy values
//! outside the vocabulary survive as [`OrderStatus::Unknown`] so old documents
//! still load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status shared by orders (aggregate) and order items (per line)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// 待确认
    #[default]
    New,
    /// 已确认，库存已扣减
    OrderReceived,
    /// 配送中
    Delivery,
    /// 已送达
    Delivered,
    /// 已取消
    Cancelled,
    /// 退货
    Return,
    /// Value outside the vocabulary (lowercased raw value)
    Unknown(String),
}

impl OrderStatus {
    /// Every known status, in lifecycle order
    pub const KNOWN: [OrderStatus; 6] = [
        OrderStatus::New,
        OrderStatus::OrderReceived,
        OrderStatus::Delivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Return,
    ];

    /// Parse a stored or user-supplied value, case-insensitively
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "new" => OrderStatus::New,
            "orderreceived" => OrderStatus::OrderReceived,
            "delivery" => OrderStatus::Delivery,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            "return" => OrderStatus::Return,
            _ => OrderStatus::Unknown(normalized),
        }
    }

    /// Canonical display form (`orderReceived`)
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::OrderReceived => "orderReceived",
            OrderStatus::Delivery => "delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Return => "return",
            OrderStatus::Unknown(raw) => raw,
        }
    }

    /// Storage form (lowercase)
    pub fn normalized(&self) -> String {
        self.as_str().to_lowercase()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// `delivery` or `delivered`
    pub fn is_in_delivery_or_delivered(&self) -> bool {
        matches!(self, OrderStatus::Delivery | OrderStatus::Delivered)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OrderStatus::Unknown(_))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(OrderStatus::parse(s))
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        OrderStatus::parse(&value)
    }
}

impl From<&str> for OrderStatus {
    fn from(value: &str) -> Self {
        OrderStatus::parse(value)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.normalized()
    }
}
