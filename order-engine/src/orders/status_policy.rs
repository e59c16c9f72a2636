//! Status policy
//!
//! Single source of truth for:
//! - default / allowed sub-statuses per status
//! - the stock action a status transition implies
//! - the priority used when merging item statuses into an order status
//!
//! Every stock mutation in the engine is derived from [`StatusPolicy::stock_action_for`];
//! no operation decides reduce/restore on its own.

use shared::order::OrderStatus;

/// Sub-status written when an order is fully cancelled
pub const CANCELLED_BY_ADMIN: &str = "Cancelled by Admin";

/// Aggregate fallback when a mixed order has no live status left
pub const PARTIALLY_CONFIRMED: &str = "Partially confirmed";

/// Stock side effect of a status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAction {
    /// Take `quantity` out of stock
    Reduce,
    /// Put `quantity` back into stock
    Restore,
    None,
}

impl StockAction {
    /// Signed stock delta for `quantity` units
    pub fn delta(&self, quantity: i32) -> i64 {
        let quantity = i64::from(quantity);
        match self {
            StockAction::Reduce => -quantity,
            StockAction::Restore => quantity,
            StockAction::None => 0,
        }
    }
}

/// Status lookup table
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusPolicy;

impl StatusPolicy {
    /// Stock action for `old → new`
    ///
    /// Entering `orderReceived` reduces; leaving it, or entering `cancelled`,
    /// restores. Re-applying the current status is always a no-op.
    pub fn stock_action_for(&self, old: &OrderStatus, new: &OrderStatus) -> StockAction {
        let old = old.normalized();
        let new = new.normalized();

        if new == "orderreceived" && old != "orderreceived" {
            StockAction::Reduce
        } else if old == "orderreceived" && new != "orderreceived" {
            StockAction::Restore
        } else if new == "cancelled" && old != "cancelled" {
            StockAction::Restore
        } else {
            StockAction::None
        }
    }

    /// Whether an item in `status` currently has its quantity taken out of stock
    pub fn holds_stock(&self, status: &OrderStatus) -> bool {
        matches!(status, OrderStatus::OrderReceived)
    }

    /// Item sub-status used when the caller supplies none
    pub fn default_sub_status(&self, status: &OrderStatus) -> String {
        match status {
            OrderStatus::New => "Pending Confirmation".to_string(),
            OrderStatus::OrderReceived => "Order Confirmed".to_string(),
            OrderStatus::Delivery => "Out for delivery".to_string(),
            OrderStatus::Delivered => "Delivered".to_string(),
            OrderStatus::Cancelled => CANCELLED_BY_ADMIN.to_string(),
            OrderStatus::Return => "Return requested".to_string(),
            OrderStatus::Unknown(raw) => raw.clone(),
        }
    }

    /// Sub-statuses offered for `status`
    pub fn allowed_sub_statuses(&self, status: &OrderStatus) -> &'static [&'static str] {
        match status {
            OrderStatus::New => &["Pending Confirmation"],
            OrderStatus::OrderReceived => &["Order Confirmed", "Packed", "Ready to ship"],
            OrderStatus::Delivery => &["Shipped", "Out for delivery", "In transit"],
            OrderStatus::Delivered => &["Delivered"],
            OrderStatus::Cancelled => &[
                CANCELLED_BY_ADMIN,
                "Cancelled by Customer",
                "Cancelled - Out of stock",
            ],
            OrderStatus::Return => &["Return requested", "Return picked up", "Refunded"],
            OrderStatus::Unknown(_) => &[],
        }
    }

    pub fn is_allowed_sub_status(&self, status: &OrderStatus, sub_status: &str) -> bool {
        self.allowed_sub_statuses(status)
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(sub_status.trim()))
    }

    /// Supplied sub-status, or the default when absent/blank
    ///
    /// Values outside the table are kept as given.
    pub fn resolve_sub_status(&self, status: &OrderStatus, supplied: Option<&str>) -> String {
        match supplied.map(str::trim) {
            Some(s) if !s.is_empty() => {
                if !self.is_allowed_sub_status(status, s) {
                    tracing::debug!(status = %status, sub_status = %s, "Free-text sub-status");
                }
                s.to_string()
            }
            _ => self.default_sub_status(status),
        }
    }

    /// Merge priority; lower wins when item statuses are mixed
    pub fn priority(&self, status: &OrderStatus) -> u32 {
        match status {
            OrderStatus::Cancelled => 1,
            OrderStatus::Return => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Delivery => 4,
            OrderStatus::OrderReceived => 5,
            OrderStatus::New => 6,
            OrderStatus::Unknown(_) => 999,
        }
    }

    /// Order sub-status when every item shares `status`
    pub fn uniform_sub_status(&self, status: &OrderStatus) -> String {
        match status {
            OrderStatus::New => "Pending Confirmation".to_string(),
            OrderStatus::OrderReceived => "Order Confirmed".to_string(),
            OrderStatus::Delivery => "All items out for delivery".to_string(),
            OrderStatus::Delivered => "All items delivered".to_string(),
            OrderStatus::Cancelled => CANCELLED_BY_ADMIN.to_string(),
            OrderStatus::Return => "All items returned".to_string(),
            OrderStatus::Unknown(raw) => format!("All items {raw}"),
        }
    }

    /// Order sub-status when `status` wins a mixed merge
    pub fn partial_sub_status(&self, status: &OrderStatus) -> String {
        let label = match status {
            OrderStatus::New => "pending",
            OrderStatus::OrderReceived => "confirmed",
            OrderStatus::Delivery => "out for delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Return => "returned",
            OrderStatus::Unknown(raw) => raw.as_str(),
        };
        format!("Partially {label}")
    }
}
