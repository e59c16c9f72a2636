//! Order aggregation
//!
//! Derives an order's status, sub-status, amounts and counts from the full set
//! of its items. Everything is recomputed from scratch on each pass; nothing
//! is patched incrementally, so a missed update path can never leave a
//! counter drifting.
//!
//! # Status merge
//!
//! ```text
//! all items share one status  → that status, "uniform" sub-status
//! mixed                       → drop cancelled items, lowest priority number wins,
//!                               "Partially <status>" sub-status
//! mixed, nothing live left    → orderReceived / "Partially confirmed"
//! no items                    → new / "Pending Confirmation"
//! ```

use super::money::{AmountOverflow, MoneyResult, sum_amounts, to_decimal, to_f64};
use super::status_policy::{PARTIALLY_CONFIRMED, StatusPolicy};
use rust_decimal::Decimal;
use shared::order::{Order, OrderItem, OrderStatus};

/// Where the order total comes from on this pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TotalBasis {
    /// Keep the stored total (externally supplied at checkout)
    Existing(f64),
    /// Sum of subtotals of all non-cancelled items
    ActiveItems,
}

/// Derived order fields
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAggregate {
    pub status: OrderStatus,
    pub sub_status: String,
    pub total_price: f64,
    pub products_price: f64,
    pub other_charges: f64,
    pub items_count: u32,
    pub items_in_delivery_or_delivered_count: u32,
}

impl OrderAggregate {
    /// Write the derived fields onto `order`
    pub fn apply_to(&self, order: &mut Order, now: i64) {
        order.status = self.status.clone();
        order.sub_status = self.sub_status.clone();
        order.total_price = self.total_price;
        order.products_price = self.products_price;
        order.other_charges = self.other_charges;
        order.items_count = self.items_count;
        order.items_in_delivery_or_delivered_count = self.items_in_delivery_or_delivered_count;
        order.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderAggregator {
    policy: StatusPolicy,
}

impl OrderAggregator {
    pub fn new(policy: StatusPolicy) -> Self {
        Self { policy }
    }

    /// Full aggregation pass over one order's items
    ///
    /// Fails only when the amounts leave the `Decimal` range.
    pub fn aggregate(&self, items: &[OrderItem], basis: TotalBasis) -> MoneyResult<OrderAggregate> {
        let (status, sub_status) = self.resolve_status(items);

        let products = sum_amounts(items.iter().map(|i| i.subtotal))?.max(Decimal::ZERO);
        let total = match basis {
            TotalBasis::Existing(total) => to_decimal(total),
            TotalBasis::ActiveItems => sum_amounts(
                items
                    .iter()
                    .filter(|i| !i.item_status.is_cancelled())
                    .map(|i| i.subtotal),
            )?,
        }
        .max(Decimal::ZERO);

        // Shortfall is absorbed by other charges; total is lifted so that
        // total == products + other always holds.
        let other = (total - products).max(Decimal::ZERO);
        let total = products.checked_add(other).ok_or(AmountOverflow)?;

        let in_delivery = items
            .iter()
            .filter(|i| i.item_status.is_in_delivery_or_delivered())
            .count();

        Ok(OrderAggregate {
            status,
            sub_status,
            total_price: to_f64(total),
            products_price: to_f64(products),
            other_charges: to_f64(other),
            items_count: count_u32(items.len()),
            items_in_delivery_or_delivered_count: count_u32(in_delivery),
        })
    }

    /// Merge item statuses into the order status and sub-status
    pub fn resolve_status(&self, items: &[OrderItem]) -> (OrderStatus, String) {
        let mut distinct: Vec<&OrderStatus> = Vec::new();
        for item in items {
            if !distinct.contains(&&item.item_status) {
                distinct.push(&item.item_status);
            }
        }

        match distinct.as_slice() {
            [] => (OrderStatus::New, self.policy.uniform_sub_status(&OrderStatus::New)),
            [only] => ((*only).clone(), self.policy.uniform_sub_status(only)),
            mixed => {
                let winner = mixed
                    .iter()
                    .filter(|s| !s.is_cancelled())
                    .min_by_key(|s| self.policy.priority(s));
                match winner {
                    Some(status) => ((*status).clone(), self.policy.partial_sub_status(status)),
                    None => (OrderStatus::OrderReceived, PARTIALLY_CONFIRMED.to_string()),
                }
            }
        }
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
