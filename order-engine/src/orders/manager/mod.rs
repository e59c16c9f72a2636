//! OrderLifecycleService - public order operations
//!
//! This module handles:
//! - Input validation and price resolution against the stock collaborator
//! - Item status transitions (single item, whole order, cancellation)
//! - Re-aggregation of the parent order after every item change
//! - Stock compensation derived from [`StatusPolicy`]
//! - Analytics / notification hooks
//!
//! # Operation Flow
//!
//! ```text
//! operation(args)
//!     ├─ 1. Validate input (no writes yet)
//!     ├─ 2. Resolve prices / names from the stock collaborator
//!     ├─ 3. Begin write transaction
//!     ├─ 4. Re-read item + order, apply the transition
//!     ├─ 5. Re-aggregate the order from its full item set
//!     ├─ 6. Commit
//!     ├─ 7. Apply stock deltas for the committed transitions
//!     └─ 8. Fire hooks
//! ```
//!
//! A write transaction is never held across an `.await`: steps 3-6 run in a
//! synchronous `commit_*` helper. Because redb serializes writers, the status
//! read in step 4 is authoritative, and two identical concurrent transitions
//! yield exactly one stock mutation.

mod error;
pub use error::*;

#[cfg(test)]
mod tests;

use super::aggregator::{OrderAggregator, TotalBasis};
use super::hooks::OrderHooks;
use super::ids::IdScope;
use super::item_store::OrderItemStore;
use super::money::{is_representable, line_subtotal};
use super::status_policy::{CANCELLED_BY_ADMIN, StatusPolicy, StockAction};
use super::stock::{StockError, StockLedger, select_stock_record};
use super::storage::{OrderStorage, StorageError};
use crate::core::Config;
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use shared::order::{Order, OrderDraft, OrderItem, OrderItemDraft, OrderStatus, Shipment};
use shared::util::now_millis;
use std::future::Future;
use std::sync::Arc;

/// Default caller-layer retries on ID conflicts
const DEFAULT_ID_CONFLICT_RETRIES: u32 = 1;

/// A stock delta the collaborator failed to apply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockWarning {
    pub item_id: String,
    pub product_id: String,
    pub delta: i64,
    pub message: String,
}

/// Partial-success report of a committed operation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationReport {
    pub stock_warnings: Vec<StockWarning>,
}

impl OperationReport {
    /// No side channel failed
    pub fn is_clean(&self) -> bool {
        self.stock_warnings.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderOutcome {
    /// Items cancelled by this call
    pub cancelled_item_count: u32,
    /// The order was already cancelled; nothing was written
    pub already_cancelled: bool,
    pub stock_warnings: Vec<StockWarning>,
}

/// Who cancelled and why
struct Cancellation<'a> {
    reason: &'a str,
    cancelled_by: &'a str,
}

/// Stock delta owed for a committed item change
struct StockChange {
    item: OrderItem,
    delta: i64,
}

/// A line resolved against the stock collaborator
struct ResolvedLine {
    draft: OrderItemDraft,
    unit_price: f64,
    stock_record_id: Option<String>,
    name: Option<String>,
}

enum ItemChange {
    Add(ResolvedLine),
    Edit {
        item_id: String,
        draft: OrderItemDraft,
        name: Option<String>,
    },
}

/// Output of a committed write, consumed by [`OrderLifecycleService::settle`]
struct Committed {
    before: Option<Order>,
    after: Order,
    stock: Vec<StockChange>,
}

/// Order lifecycle orchestration
pub struct OrderLifecycleService {
    storage: OrderStorage,
    items: OrderItemStore,
    ledger: Arc<dyn StockLedger>,
    hooks: Arc<dyn OrderHooks>,
    policy: StatusPolicy,
    aggregator: OrderAggregator,
    id_conflict_retries: u32,
}

impl std::fmt::Debug for OrderLifecycleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycleService")
            .field("storage", &"<OrderStorage>")
            .field("ledger", &"<dyn StockLedger>")
            .field("hooks", &"<dyn OrderHooks>")
            .field("id_conflict_retries", &self.id_conflict_retries)
            .finish()
    }
}

impl OrderLifecycleService {
    pub fn new(storage: OrderStorage, ledger: Arc<dyn StockLedger>, hooks: Arc<dyn OrderHooks>) -> Self {
        let policy = StatusPolicy;
        Self {
            items: OrderItemStore::new(storage.clone(), ledger.clone()),
            storage,
            ledger,
            hooks,
            policy,
            aggregator: OrderAggregator::new(policy),
            id_conflict_retries: DEFAULT_ID_CONFLICT_RETRIES,
        }
    }

    /// Open the file-backed store described by `config`
    pub fn open(
        config: &Config,
        ledger: Arc<dyn StockLedger>,
        hooks: Arc<dyn OrderHooks>,
    ) -> LifecycleResult<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            LifecycleError::Internal(format!("Failed to create work dir {}: {e}", config.work_dir))
        })?;
        let db_path = config.db_path();
        let storage = OrderStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Order storage opened");

        Ok(Self::new(storage, ledger, hooks).with_id_conflict_retries(config.id_conflict_retries))
    }

    pub fn with_id_conflict_retries(mut self, retries: u32) -> Self {
        self.id_conflict_retries = retries;
        self
    }

    /// Get the underlying storage
    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    // ========== Queries ==========

    pub fn get_order(&self, order_id: &str) -> LifecycleResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| LifecycleError::OrderNotFound(order_id.to_string()))
    }

    pub fn list_orders(&self) -> LifecycleResult<Vec<Order>> {
        Ok(self.storage.list_orders()?)
    }

    pub fn get_item(&self, item_id: &str) -> LifecycleResult<OrderItem> {
        self.items
            .get(item_id)?
            .ok_or_else(|| LifecycleError::ItemNotFound(item_id.to_string()))
    }

    /// Items of an existing order, ordered by ID
    pub fn list_items(&self, order_id: &str) -> LifecycleResult<Vec<OrderItem>> {
        self.get_order(order_id)?;
        Ok(self.items.list_by_order(order_id)?)
    }

    pub fn get_shipment(&self, item_id: &str) -> LifecycleResult<Option<Shipment>> {
        Ok(self.storage.get_shipment(item_id)?)
    }

    // ========== Create ==========

    /// Place a new order
    ///
    /// All lines are validated and priced before anything is written; the
    /// order, its items and their shipments are then written in one
    /// transaction. Without `draft.total_price` the total is the item sum.
    pub async fn create_order(
        &self,
        draft: OrderDraft,
        lines: Vec<OrderItemDraft>,
    ) -> LifecycleResult<Order> {
        if lines.is_empty() {
            return Err(LifecycleError::Validation(
                "An order needs at least one line item".to_string(),
            ));
        }
        for line in &lines {
            validate_line(line)?;
            if let Some(id) = &line.id {
                return Err(LifecycleError::Validation(format!(
                    "New order lines must not carry an id (got {id})"
                )));
            }
        }
        if let Some(total) = draft.total_price
            && (!total.is_finite() || total < 0.0 || !is_representable(total))
        {
            return Err(LifecycleError::Validation(format!("Invalid order total: {total}")));
        }

        let mut resolved = Vec::with_capacity(lines.len());
        for line in lines {
            resolved.push(self.resolve_line(line).await?);
        }

        let order = self.commit_new_order(draft, resolved)?;
        tracing::info!(
            order_id = %order.id,
            items = order.items_count,
            total = order.total_price,
            "Order created"
        );

        if let Err(e) = self.hooks.on_order_created(&order).await {
            tracing::warn!(order_id = %order.id, error = %e, "on_order_created hook failed");
        }
        Ok(order)
    }

    /// [`create_order`](Self::create_order), retried on ID conflicts
    pub async fn create_order_with_retry(
        &self,
        draft: OrderDraft,
        lines: Vec<OrderItemDraft>,
    ) -> LifecycleResult<Order> {
        retry_on_conflict(self.id_conflict_retries, || {
            self.create_order(draft.clone(), lines.clone())
        })
        .await
    }

    fn commit_new_order(&self, draft: OrderDraft, lines: Vec<ResolvedLine>) -> LifecycleResult<Order> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let order_id = self.storage.allocate_id_txn(&txn, IdScope::Orders)?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item_id = self.storage.allocate_id_txn(&txn, IdScope::OrderItems)?;
            let item = self.new_item(item_id, &order_id, line, now)?;
            self.items.upsert_txn(&txn, &item)?;
            self.storage.ensure_shipment_txn(&txn, &item, now)?;
            items.push(item);
        }

        let basis = match draft.total_price {
            Some(total) => TotalBasis::Existing(total),
            None => TotalBasis::ActiveItems,
        };
        let mut order = Order {
            id: order_id,
            user_id: draft.user_id,
            status: OrderStatus::New,
            sub_status: self.policy.default_sub_status(&OrderStatus::New),
            total_price: 0.0,
            products_price: 0.0,
            other_charges: 0.0,
            items_count: 0,
            items_in_delivery_or_delivered_count: 0,
            note: draft.note,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        };
        self.aggregator.aggregate(&items, basis)?.apply_to(&mut order, now);
        self.storage.put_order_txn(&txn, &order)?;

        txn.commit().map_err(StorageError::from)?;
        Ok(order)
    }

    // ========== Add / Update Item ==========

    /// Add a line to an order (`draft.id == None`) or edit an existing one
    ///
    /// Edits may change quantity, free marker and name. Product and stock
    /// references of an existing line are fixed. If the item currently holds
    /// stock, the quantity difference is applied to the ledger.
    pub async fn add_or_update_item(
        &self,
        order_id: &str,
        draft: OrderItemDraft,
    ) -> LifecycleResult<(OrderItem, OperationReport)> {
        validate_line(&draft)?;
        self.get_order(order_id)?;

        let change = match draft.id.clone() {
            None => ItemChange::Add(self.resolve_line(draft).await?),
            Some(item_id) => {
                let existing = self.get_item(&item_id)?;
                check_edit(&existing, order_id, &draft)?;
                let name = match non_blank(draft.name.as_deref()) {
                    Some(name) => Some(name),
                    None if existing.name.is_none() => self.items.resolve_name(&existing.product_id).await,
                    None => existing.name.clone(),
                };
                ItemChange::Edit {
                    item_id,
                    draft,
                    name,
                }
            }
        };

        let (item, committed) = self.commit_item_change(order_id, change)?;
        tracing::info!(
            order_id = %order_id,
            item_id = %item.id,
            quantity = item.quantity,
            "Order item saved"
        );

        let report = self.settle(committed).await;
        Ok((item, report))
    }

    fn commit_item_change(
        &self,
        order_id: &str,
        change: ItemChange,
    ) -> LifecycleResult<(OrderItem, Committed)> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let mut order = self.load_order_txn(&txn, order_id)?;
        let before = order.clone();
        let mut stock = Vec::new();

        let item = match change {
            ItemChange::Add(line) => {
                let item_id = self.storage.allocate_id_txn(&txn, IdScope::OrderItems)?;
                self.new_item(item_id, order_id, line, now)?
            }
            ItemChange::Edit {
                item_id,
                draft,
                name,
            } => {
                let mut item = self
                    .items
                    .get_txn(&txn, &item_id)?
                    .ok_or_else(|| LifecycleError::ItemNotFound(item_id.clone()))?;
                let growth = i64::from(draft.quantity) - i64::from(item.quantity);

                item.quantity = draft.quantity;
                item.is_free = draft.is_free;
                item.free_offer_id = draft.free_offer_id;
                item.name = name;
                item.subtotal = line_subtotal(item.unit_price, item.quantity, item.is_free)?;
                item.updated_at = now;

                if growth != 0 && self.policy.holds_stock(&item.item_status) {
                    stock.push(StockChange {
                        item: item.clone(),
                        delta: -growth,
                    });
                }
                item
            }
        };

        self.items.upsert_txn(&txn, &item)?;
        self.storage.ensure_shipment_txn(&txn, &item, now)?;
        self.reaggregate_txn(&txn, &mut order, TotalBasis::ActiveItems, None, now)?;

        txn.commit().map_err(StorageError::from)?;
        Ok((
            item,
            Committed {
                before: Some(before),
                after: order,
                stock,
            },
        ))
    }

    // ========== Status Transitions ==========

    /// Move one item to `status`
    ///
    /// `sub_status` falls back to the policy default when absent or blank.
    /// Re-applying the current status touches no stock.
    pub async fn change_item_status(
        &self,
        item_id: &str,
        status: OrderStatus,
        sub_status: Option<&str>,
    ) -> LifecycleResult<OperationReport> {
        validate_target_status(&status)?;

        match self.commit_item_transition(item_id, &status, sub_status, None)? {
            Some(committed) => {
                tracing::info!(item_id = %item_id, status = %status, "Item status changed");
                Ok(self.settle(committed).await)
            }
            None => Ok(OperationReport::default()),
        }
    }

    /// Move every item of an order to `status`, then aggregate once
    pub async fn change_order_status_bulk(
        &self,
        order_id: &str,
        status: OrderStatus,
        sub_status: Option<&str>,
    ) -> LifecycleResult<OperationReport> {
        validate_target_status(&status)?;

        match self.commit_bulk_transition(order_id, &status, sub_status, None)? {
            Some((committed, changed)) => {
                tracing::info!(order_id = %order_id, status = %status, items = changed, "Order status changed");
                Ok(self.settle(committed).await)
            }
            None => Ok(OperationReport::default()),
        }
    }

    /// Cancel one item; no-op if it is already cancelled
    pub async fn cancel_item(
        &self,
        item_id: &str,
        reason: &str,
        cancelled_by: &str,
    ) -> LifecycleResult<OperationReport> {
        let cancellation = Cancellation {
            reason,
            cancelled_by,
        };
        match self.commit_item_transition(
            item_id,
            &OrderStatus::Cancelled,
            Some(CANCELLED_BY_ADMIN),
            Some(&cancellation),
        )? {
            Some(committed) => {
                tracing::info!(item_id = %item_id, cancelled_by = %cancelled_by, "Item cancelled");
                Ok(self.settle(committed).await)
            }
            None => {
                tracing::debug!(item_id = %item_id, "Item already cancelled");
                Ok(OperationReport::default())
            }
        }
    }

    /// Cancel every live item and mark the order cancelled
    ///
    /// Calling it on an already cancelled order succeeds without writing.
    pub async fn cancel_order(
        &self,
        order_id: &str,
        reason: &str,
        cancelled_by: &str,
    ) -> LifecycleResult<CancelOrderOutcome> {
        let cancellation = Cancellation {
            reason,
            cancelled_by,
        };
        let Some((committed, cancelled)) = self.commit_bulk_transition(
            order_id,
            &OrderStatus::Cancelled,
            Some(CANCELLED_BY_ADMIN),
            Some(&cancellation),
        )?
        else {
            tracing::debug!(order_id = %order_id, "Order already cancelled");
            return Ok(CancelOrderOutcome {
                already_cancelled: true,
                ..Default::default()
            });
        };

        tracing::info!(
            order_id = %order_id,
            cancelled_items = cancelled,
            cancelled_by = %cancelled_by,
            "Order cancelled"
        );
        let report = self.settle(committed).await;
        Ok(CancelOrderOutcome {
            cancelled_item_count: cancelled,
            already_cancelled: false,
            stock_warnings: report.stock_warnings,
        })
    }

    /// Returns `None` when a cancellation finds the item already cancelled
    fn commit_item_transition(
        &self,
        item_id: &str,
        status: &OrderStatus,
        sub_status: Option<&str>,
        cancellation: Option<&Cancellation<'_>>,
    ) -> LifecycleResult<Option<Committed>> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let mut item = self
            .items
            .get_txn(&txn, item_id)?
            .ok_or_else(|| LifecycleError::ItemNotFound(item_id.to_string()))?;
        if cancellation.is_some() && item.item_status.is_cancelled() {
            txn.abort().map_err(StorageError::from)?;
            return Ok(None);
        }

        let mut order = self.load_order_txn(&txn, &item.order_id)?;
        let before = order.clone();

        let sub_status = self.policy.resolve_sub_status(status, sub_status);
        let action = self.set_item_status(&mut item, status, sub_status, cancellation, now);
        self.items.upsert_txn(&txn, &item)?;

        let basis = TotalBasis::Existing(order.total_price);
        self.reaggregate_txn(&txn, &mut order, basis, cancellation, now)?;

        txn.commit().map_err(StorageError::from)?;
        Ok(Some(Committed {
            before: Some(before),
            after: order,
            stock: stock_change(item, action).into_iter().collect(),
        }))
    }

    /// Returns `None` when a cancellation finds the order already cancelled
    fn commit_bulk_transition(
        &self,
        order_id: &str,
        status: &OrderStatus,
        sub_status: Option<&str>,
        cancellation: Option<&Cancellation<'_>>,
    ) -> LifecycleResult<Option<(Committed, u32)>> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let mut order = self.load_order_txn(&txn, order_id)?;
        if cancellation.is_some() && order.status.is_cancelled() {
            txn.abort().map_err(StorageError::from)?;
            return Ok(None);
        }
        let before = order.clone();

        let sub_status = self.policy.resolve_sub_status(status, sub_status);
        let mut stock = Vec::new();
        let mut changed = 0u32;
        for mut item in self.items.list_by_order_txn(&txn, order_id)? {
            if cancellation.is_some() && item.item_status.is_cancelled() {
                continue;
            }
            let action = self.set_item_status(&mut item, status, sub_status.clone(), cancellation, now);
            self.items.upsert_txn(&txn, &item)?;
            stock.extend(stock_change(item, action));
            changed += 1;
        }

        let basis = TotalBasis::Existing(order.total_price);
        if cancellation.is_some() {
            // 全部取消: 直接写订单状态, 不依赖聚合结果
            let items = self.items.list_by_order_txn(&txn, order_id)?;
            self.aggregator.aggregate(&items, basis)?.apply_to(&mut order, now);
            order.status = OrderStatus::Cancelled;
            order.sub_status = CANCELLED_BY_ADMIN.to_string();
            stamp_order_cancellation(&mut order, cancellation, now);
            self.storage.put_order_txn(&txn, &order)?;
        } else {
            self.reaggregate_txn(&txn, &mut order, basis, None, now)?;
        }

        txn.commit().map_err(StorageError::from)?;
        Ok(Some((
            Committed {
                before: Some(before),
                after: order,
                stock,
            },
            changed,
        )))
    }

    // ========== Delete ==========

    /// Remove an order with its items and shipments
    ///
    /// Administrative purge: stock is not touched.
    pub async fn delete_order(&self, order_id: &str) -> LifecycleResult<Order> {
        let (order, removed_items) = self.commit_delete(order_id)?;
        tracing::info!(order_id = %order_id, items = removed_items, "Order deleted");

        if let Err(e) = self.hooks.on_order_deleted(&order).await {
            tracing::warn!(order_id = %order_id, error = %e, "on_order_deleted hook failed");
        }
        Ok(order)
    }

    fn commit_delete(&self, order_id: &str) -> LifecycleResult<(Order, usize)> {
        let txn = self.storage.begin_write()?;
        let Some(order) = self.storage.remove_order_txn(&txn, order_id)? else {
            txn.abort().map_err(StorageError::from)?;
            return Err(LifecycleError::OrderNotFound(order_id.to_string()));
        };
        let items = self.storage.remove_items_for_order_txn(&txn, order_id)?;
        txn.commit().map_err(StorageError::from)?;
        Ok((order, items.len()))
    }

    // ========== Helpers ==========

    fn load_order_txn(&self, txn: &WriteTransaction, order_id: &str) -> LifecycleResult<Order> {
        self.storage
            .get_order_txn(txn, order_id)?
            .ok_or_else(|| LifecycleError::OrderNotFound(order_id.to_string()))
    }

    /// Recompute `order` from its stored items and write it back
    fn reaggregate_txn(
        &self,
        txn: &WriteTransaction,
        order: &mut Order,
        basis: TotalBasis,
        cancellation: Option<&Cancellation<'_>>,
        now: i64,
    ) -> LifecycleResult<()> {
        let items = self.items.list_by_order_txn(txn, &order.id)?;
        self.aggregator.aggregate(&items, basis)?.apply_to(order, now);
        stamp_order_cancellation(order, cancellation, now);
        self.storage.put_order_txn(txn, order)?;
        Ok(())
    }

    /// Write the new status onto `item`; returns the stock action it implies
    fn set_item_status(
        &self,
        item: &mut OrderItem,
        status: &OrderStatus,
        sub_status: String,
        cancellation: Option<&Cancellation<'_>>,
        now: i64,
    ) -> StockAction {
        let action = self.policy.stock_action_for(&item.item_status, status);
        let was_cancelled = item.item_status.is_cancelled();

        item.item_status = status.clone();
        item.item_sub_status = sub_status;
        if status.is_cancelled() {
            if !was_cancelled {
                item.cancelled_at = Some(now);
            }
            if let Some(c) = cancellation {
                item.cancellation_reason = Some(c.reason.to_string());
                item.cancelled_by = Some(c.cancelled_by.to_string());
            }
        } else {
            item.cancellation_reason = None;
            item.cancelled_at = None;
            item.cancelled_by = None;
        }
        item.updated_at = now;
        action
    }

    fn new_item(
        &self,
        id: String,
        order_id: &str,
        line: ResolvedLine,
        now: i64,
    ) -> LifecycleResult<OrderItem> {
        let status = OrderStatus::New;
        let draft = line.draft;
        Ok(OrderItem {
            id,
            order_id: order_id.to_string(),
            subtotal: line_subtotal(line.unit_price, draft.quantity, draft.is_free)?,
            product_id: draft.product_id,
            variant_id: draft.variant_id,
            stock_record_id: line.stock_record_id,
            name: line.name,
            unit_price: line.unit_price,
            quantity: draft.quantity,
            item_sub_status: self.policy.default_sub_status(&status),
            item_status: status,
            is_free: draft.is_free,
            free_offer_id: draft.free_offer_id,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Price a new line from the product's stock record
    async fn resolve_line(&self, draft: OrderItemDraft) -> LifecycleResult<ResolvedLine> {
        let records = match self.ledger.get_stock_for_product(&draft.product_id).await {
            Ok(records) => records,
            Err(StockError::ProductNotFound(id)) => return Err(LifecycleError::ProductNotFound(id)),
            Err(e) => {
                return Err(LifecycleError::Validation(format!(
                    "Cannot resolve product {}: {e}",
                    draft.product_id
                )));
            }
        };

        let record = select_stock_record(
            &records,
            draft.variant_id.as_deref(),
            draft.stock_record_id.as_deref(),
        )
        .ok_or_else(|| match &draft.stock_record_id {
            Some(id) => LifecycleError::Validation(format!(
                "Stock record {id} not found for product {}",
                draft.product_id
            )),
            None => LifecycleError::ProductNotFound(draft.product_id.clone()),
        })?;

        if !record.price.is_finite() || record.price < 0.0 || !is_representable(record.price) {
            return Err(LifecycleError::Validation(format!(
                "Invalid price {} for product {}",
                record.price, draft.product_id
            )));
        }
        let unit_price = record.price;
        let stock_record_id = Some(record.id.clone());

        let name = match non_blank(draft.name.as_deref()) {
            Some(name) => Some(name),
            None => self.items.resolve_name(&draft.product_id).await,
        };

        Ok(ResolvedLine {
            draft,
            unit_price,
            stock_record_id,
            name,
        })
    }

    /// Apply committed stock changes, then fire the update hook
    async fn settle(&self, committed: Committed) -> OperationReport {
        let mut report = OperationReport::default();
        for change in &committed.stock {
            if let Err(e) = self.apply_stock(change).await {
                tracing::warn!(
                    item_id = %change.item.id,
                    product_id = %change.item.product_id,
                    delta = change.delta,
                    error = %e,
                    "Stock update failed, order state already committed"
                );
                report.stock_warnings.push(StockWarning {
                    item_id: change.item.id.clone(),
                    product_id: change.item.product_id.clone(),
                    delta: change.delta,
                    message: e.to_string(),
                });
            }
        }

        let after = &committed.after;
        if let Err(e) = self
            .hooks
            .on_order_updated(&after.id, committed.before.as_ref(), after)
            .await
        {
            tracing::warn!(order_id = %after.id, error = %e, "on_order_updated hook failed");
        }
        report
    }

    async fn apply_stock(&self, change: &StockChange) -> Result<i64, StockError> {
        let item = &change.item;
        let stock_record_id = match &item.stock_record_id {
            Some(id) => id.clone(),
            None => {
                let records = self.ledger.get_stock_for_product(&item.product_id).await?;
                select_stock_record(&records, item.variant_id.as_deref(), None)
                    .map(|r| r.id.clone())
                    .ok_or_else(|| StockError::ProductNotFound(item.product_id.clone()))?
            }
        };

        let quantity = self
            .ledger
            .apply_delta(&item.product_id, &stock_record_id, change.delta)
            .await?;
        tracing::debug!(
            item_id = %item.id,
            stock_record_id = %stock_record_id,
            delta = change.delta,
            quantity = quantity,
            "Stock adjusted"
        );
        Ok(quantity)
    }
}

/// Run `op`, retrying it up to `retries` more times while it fails with
/// [`LifecycleError::Conflict`]
pub async fn retry_on_conflict<T, F, Fut>(retries: u32, mut op: F) -> LifecycleResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LifecycleResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(LifecycleError::Conflict(id)) if attempt < retries => {
                attempt += 1;
                tracing::warn!(id = %id, attempt, "ID conflict, retrying operation");
            }
            other => return other,
        }
    }
}

fn validate_line(draft: &OrderItemDraft) -> LifecycleResult<()> {
    if draft.product_id.trim().is_empty() {
        return Err(LifecycleError::Validation("productId is required".to_string()));
    }
    if draft.quantity <= 0 {
        return Err(LifecycleError::InvalidQuantity(draft.quantity));
    }
    Ok(())
}

fn validate_target_status(status: &OrderStatus) -> LifecycleResult<()> {
    if !status.is_known() {
        return Err(LifecycleError::InvalidStatus(status.to_string()));
    }
    Ok(())
}

/// Product and stock references of an existing line cannot change
fn check_edit(existing: &OrderItem, order_id: &str, draft: &OrderItemDraft) -> LifecycleResult<()> {
    if existing.order_id != order_id {
        return Err(LifecycleError::ItemOrderMismatch {
            item_id: existing.id.clone(),
            order_id: order_id.to_string(),
        });
    }
    if existing.product_id != draft.product_id {
        return Err(LifecycleError::Validation(format!(
            "Item {} is for product {}, not {}",
            existing.id, existing.product_id, draft.product_id
        )));
    }
    let moved_variant = draft.variant_id.is_some() && draft.variant_id != existing.variant_id;
    let moved_record =
        draft.stock_record_id.is_some() && draft.stock_record_id != existing.stock_record_id;
    if moved_variant || moved_record {
        return Err(LifecycleError::Validation(format!(
            "Stock reference of item {} cannot be changed",
            existing.id
        )));
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn stock_change(item: OrderItem, action: StockAction) -> Option<StockChange> {
    let delta = action.delta(item.quantity);
    (delta != 0).then_some(StockChange { item, delta })
}

/// Keep the order's cancellation fields in step with its status
fn stamp_order_cancellation(order: &mut Order, cancellation: Option<&Cancellation<'_>>, now: i64) {
    if order.status.is_cancelled() {
        if order.cancelled_at.is_none() {
            order.cancelled_at = Some(now);
        }
        if let Some(c) = cancellation {
            order.cancellation_reason = Some(c.reason.to_string());
            order.cancelled_by = Some(c.cancelled_by.to_string());
        }
    } else {
        order.cancellation_reason = None;
        order.cancelled_at = None;
        order.cancelled_by = None;
    }
}
