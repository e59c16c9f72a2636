//! Persisted record shapes for orders and order items

use super::status::OrderStatus;
use serde::{Deserialize, Serialize};

// ============================================================================
// Order
// ============================================================================

/// One purchase transaction
///
/// Aggregate fields (`status`, `sub_status`, amounts and counts) are derived
/// from the order's items and are only written by the aggregation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// `ORD` + 10 digits
    pub id: String,
    /// Customer reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub status: OrderStatus,
    pub sub_status: String,
    pub total_price: f64,
    pub products_price: f64,
    pub other_charges: f64,
    /// Number of items, free items included
    pub items_count: u32,
    pub items_in_delivery_or_delivered_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Caller-supplied data for a new order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    #[serde(default)]
    pub user_id: Option<String>,
    /// Total computed by checkout (cart total incl. delivery fees etc.).
    /// When absent the total is the sum of the item subtotals.
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

// ============================================================================
// Order Item
// ============================================================================

/// One product line within an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// `ITM` + 10 digits
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_record_id: Option<String>,
    /// Product display name, denormalized at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unit price captured when the item was created
    pub unit_price: f64,
    pub quantity: i32,
    /// `unit_price × quantity` (0 for free items)
    pub subtotal: f64,
    pub item_status: OrderStatus,
    pub item_sub_status: String,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_offer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Caller-supplied data for adding or editing an order item
///
/// `id` is `None` for a new line; set it to edit an existing line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub stock_record_id: Option<String>,
    pub quantity: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub free_offer_id: Option<String>,
}

impl OrderItemDraft {
    /// Convenience constructor for a paid line
    pub fn new(product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            ..Default::default()
        }
    }
}

// ============================================================================
// Stock / Fulfillment
// ============================================================================

/// Stock record owned by the catalog/stock collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub id: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    /// Never negative
    pub quantity: i64,
    pub price: f64,
}

/// Fulfillment-tracking sub-record, one per order item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub item_id: String,
    pub order_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Default shipment status for a freshly tracked item
pub const SHIPMENT_DEFAULT_STATUS: &str = "Order received";

impl Shipment {
    pub fn new(item_id: impl Into<String>, order_id: impl Into<String>, now: i64) -> Self {
        Self {
            item_id: item_id.into(),
            order_id: order_id.into(),
            status: SHIPMENT_DEFAULT_STATUS.to_string(),
            tracking_number: None,
            created_at: now,
            updated_at: now,
        }
    }
}
