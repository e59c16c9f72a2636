//! Order item persistence
//!
//! Thin layer over [`OrderStorage`] for line items. The product's display name
//! is resolved once from the stock collaborator when a line is created and
//! stored on the item, so order history survives later product renames or
//! deletions.

use super::stock::StockLedger;
use super::storage::{OrderStorage, StorageResult};
use redb::WriteTransaction;
use shared::order::OrderItem;
use std::sync::Arc;

#[derive(Clone)]
pub struct OrderItemStore {
    storage: OrderStorage,
    ledger: Arc<dyn StockLedger>,
}

impl std::fmt::Debug for OrderItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderItemStore")
            .field("storage", &self.storage)
            .field("ledger", &"<dyn StockLedger>")
            .finish()
    }
}

impl OrderItemStore {
    pub fn new(storage: OrderStorage, ledger: Arc<dyn StockLedger>) -> Self {
        Self { storage, ledger }
    }

    pub fn get(&self, item_id: &str) -> StorageResult<Option<OrderItem>> {
        self.storage.get_item(item_id)
    }

    pub fn get_txn(&self, txn: &WriteTransaction, item_id: &str) -> StorageResult<Option<OrderItem>> {
        self.storage.get_item_txn(txn, item_id)
    }

    /// Items of an order, ordered by ID
    pub fn list_by_order(&self, order_id: &str) -> StorageResult<Vec<OrderItem>> {
        self.storage.list_items_by_order(order_id)
    }

    pub fn list_by_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<OrderItem>> {
        self.storage.list_items_by_order_txn(txn, order_id)
    }

    /// Insert or replace an item (within transaction)
    pub fn upsert_txn(&self, txn: &WriteTransaction, item: &OrderItem) -> StorageResult<()> {
        self.storage.put_item_txn(txn, item)
    }

    /// Display name from the collaborator; lookup failures are logged, not raised
    pub async fn resolve_name(&self, product_id: &str) -> Option<String> {
        match self.ledger.product_name(product_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(product_id = %product_id, error = %e, "Product name lookup failed");
                None
            }
        }
    }
}
