//! redb-based storage layer for orders and order items
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` (JSON) | Order documents |
//! | `order_items` | `item_id` | `OrderItem` (JSON) | Line item documents |
//! | `order_item_index` | `order_id` | `item_id` (multimap) | Items of an order |
//! | `shipments` | `item_id` | `Shipment` (JSON) | Fulfillment tracking |
//! | `issued_ids` | `id` | `()` | Every ID handed out by the allocator |
//!
//! # Transactions
//!
//! redb allows one write transaction at a time. Everything a lifecycle
//! operation writes (items, order aggregate, shipments, new IDs) goes through a
//! single `WriteTransaction`, so readers never observe a half-applied
//! operation and aggregate writes never interleave.

use super::ids::{IdScope, format_id, next_number, parse_id, scan_upper_bound};
use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableMultimapTable, ReadableTable,
    TableDefinition, WriteTransaction,
};
use shared::order::{Order, OrderItem, Shipment};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Orders: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Items: key = item_id, value = JSON-serialized OrderItem
const ITEMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("order_items");

/// Order → items index
const ORDER_ITEM_INDEX: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("order_item_index");

/// Shipments: key = item_id, value = JSON-serialized Shipment
const SHIPMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("shipments");

/// IDs already handed out (existence only)
const ISSUED_IDS_TABLE: TableDefinition<&str, ()> = TableDefinition::new("issued_ids");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Computed ID already exists; a concurrent writer won the race
    #[error("ID conflict: {0} already exists")]
    Conflict(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the data is on disk.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, ephemeral tooling)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Create all tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ITEMS_TABLE)?;
            let _ = write_txn.open_multimap_table(ORDER_ITEM_INDEX)?;
            let _ = write_txn.open_table(SHIPMENTS_TABLE)?;
            let _ = write_txn.open_table(ISSUED_IDS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== ID Allocation ==========

    /// Allocate the next sequential ID in `scope` (within transaction)
    ///
    /// Scans the scope's record table and the issued-ID table for the highest
    /// well-formed ID and records the successor as issued. Dropping `txn`
    /// without committing releases the ID again.
    pub fn allocate_id_txn(&self, txn: &WriteTransaction, scope: IdScope) -> StorageResult<String> {
        let prefix = scope.prefix();
        let upper = scan_upper_bound(prefix);

        let records = match scope {
            IdScope::Orders => txn.open_table(ORDERS_TABLE)?,
            IdScope::OrderItems => txn.open_table(ITEMS_TABLE)?,
        };
        let mut issued = txn.open_table(ISSUED_IDS_TABLE)?;

        let highest = highest_id(&records, prefix, &upper)?.max(highest_id(&issued, prefix, &upper)?);
        let id = format_id(prefix, next_number(highest));

        // Guard only: `id` is above every key scanned in this serialized write
        // transaction, so this never fires.
        if records.get(id.as_str())?.is_some() || issued.get(id.as_str())?.is_some() {
            return Err(StorageError::Conflict(id));
        }
        issued.insert(id.as_str(), ())?;

        tracing::debug!(id = %id, "Allocated sequential id");
        Ok(id)
    }

    // ========== Order Operations ==========

    /// Store an order (insert or replace)
    pub fn put_order_txn(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get an order (within transaction)
    pub fn get_order_txn(&self, txn: &WriteTransaction, order_id: &str) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        read_json(&table, order_id)
    }

    /// Get an order
    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        read_json(&table, order_id)
    }

    /// Get all orders
    pub fn list_orders(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            orders.push(serde_json::from_slice(value.value())?);
        }
        Ok(orders)
    }

    /// Remove an order document, returning it if it existed
    pub fn remove_order_txn(&self, txn: &WriteTransaction, order_id: &str) -> StorageResult<Option<Order>> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let removed = match table.remove(order_id)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(removed)
    }

    // ========== Order Item Operations ==========

    /// Store an order item and index it under its order
    pub fn put_item_txn(&self, txn: &WriteTransaction, item: &OrderItem) -> StorageResult<()> {
        {
            let mut table = txn.open_table(ITEMS_TABLE)?;
            let value = serde_json::to_vec(item)?;
            table.insert(item.id.as_str(), value.as_slice())?;
        }
        let mut index = txn.open_multimap_table(ORDER_ITEM_INDEX)?;
        index.insert(item.order_id.as_str(), item.id.as_str())?;
        Ok(())
    }

    /// Get an order item (within transaction)
    pub fn get_item_txn(&self, txn: &WriteTransaction, item_id: &str) -> StorageResult<Option<OrderItem>> {
        let table = txn.open_table(ITEMS_TABLE)?;
        read_json(&table, item_id)
    }

    /// Get an order item
    pub fn get_item(&self, item_id: &str) -> StorageResult<Option<OrderItem>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ITEMS_TABLE)?;
        read_json(&table, item_id)
    }

    /// All items of an order, ordered by item ID (within transaction)
    pub fn list_items_by_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<OrderItem>> {
        let index = txn.open_multimap_table(ORDER_ITEM_INDEX)?;
        let table = txn.open_table(ITEMS_TABLE)?;
        collect_items(&index, &table, order_id)
    }

    /// All items of an order, ordered by item ID
    pub fn list_items_by_order(&self, order_id: &str) -> StorageResult<Vec<OrderItem>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_multimap_table(ORDER_ITEM_INDEX)?;
        let table = read_txn.open_table(ITEMS_TABLE)?;
        collect_items(&index, &table, order_id)
    }

    /// Remove every item of an order (and their shipments), returning the removed items
    pub fn remove_items_for_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<OrderItem>> {
        let items = self.list_items_by_order_txn(txn, order_id)?;
        {
            let mut index = txn.open_multimap_table(ORDER_ITEM_INDEX)?;
            index.remove_all(order_id)?;
        }
        let mut table = txn.open_table(ITEMS_TABLE)?;
        let mut shipments = txn.open_table(SHIPMENTS_TABLE)?;
        for item in &items {
            table.remove(item.id.as_str())?;
            shipments.remove(item.id.as_str())?;
        }
        Ok(items)
    }

    // ========== Shipment Operations ==========

    /// Create the item's shipment record unless one exists. Returns true if created.
    pub fn ensure_shipment_txn(
        &self,
        txn: &WriteTransaction,
        item: &OrderItem,
        now: i64,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(SHIPMENTS_TABLE)?;
        if table.get(item.id.as_str())?.is_some() {
            return Ok(false);
        }
        let shipment = Shipment::new(item.id.clone(), item.order_id.clone(), now);
        let value = serde_json::to_vec(&shipment)?;
        table.insert(item.id.as_str(), value.as_slice())?;
        Ok(true)
    }

    /// Get an item's shipment record
    pub fn get_shipment(&self, item_id: &str) -> StorageResult<Option<Shipment>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SHIPMENTS_TABLE)?;
        read_json(&table, item_id)
    }
}

// ========== Helpers ==========

fn read_json<T: serde::de::DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StorageResult<Option<T>> {
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Highest well-formed ID in `[prefix, upper)`, walking keys backwards.
///
/// All well-formed keys share one length, so the first well-formed key from the
/// top is also the numerically highest.
fn highest_id<V: redb::Value + 'static>(
    table: &impl ReadableTable<&'static str, V>,
    prefix: &str,
    upper: &str,
) -> StorageResult<Option<u64>> {
    for result in table.range(prefix..upper)?.rev() {
        let (key, _value) = result?;
        if let Some(number) = parse_id(prefix, key.value()) {
            return Ok(Some(number));
        }
    }
    Ok(None)
}

fn collect_items(
    index: &impl ReadableMultimapTable<&'static str, &'static str>,
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    order_id: &str,
) -> StorageResult<Vec<OrderItem>> {
    let mut items = Vec::new();
    for result in index.get(order_id)? {
        let item_id = result?;
        match read_json::<OrderItem>(table, item_id.value())? {
            Some(item) => items.push(item),
            None => {
                tracing::warn!(order_id = %order_id, item_id = %item_id.value(), "Dangling order item index entry");
            }
        }
    }
    items.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::OrderStatus;

    fn test_order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            user_id: Some("U1".to_string()),
            status: OrderStatus::New,
            sub_status: "Pending Confirmation".to_string(),
            total_price: 0.0,
            products_price: 0.0,
            other_charges: 0.0,
            items_count: 0,
            items_in_delivery_or_delivered_count: 0,
            note: None,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            created_at: shared::util::now_millis(),
            updated_at: shared::util::now_millis(),
        }
    }

    fn test_item(id: &str, order_id: &str) -> OrderItem {
        OrderItem {
            id: id.to_string(),
            order_id: order_id.to_string(),
            product_id: "P1".to_string(),
            variant_id: None,
            stock_record_id: Some("S1".to_string()),
            name: Some("Test Product".to_string()),
            unit_price: 10.0,
            quantity: 1,
            subtotal: 10.0,
            item_status: OrderStatus::New,
            item_sub_status: "Pending Confirmation".to_string(),
            is_free: false,
            free_offer_id: None,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_order_roundtrip() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let order = test_order("ORD1000000001");

        let txn = storage.begin_write().unwrap();
        storage.put_order_txn(&txn, &order).unwrap();
        txn.commit().unwrap();

        assert_eq!(storage.get_order("ORD1000000001").unwrap(), Some(order));
        assert_eq!(storage.get_order("ORD1000000002").unwrap(), None);
    }

    #[test]
    fn test_items_listed_by_order() {
        let storage = OrderStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        storage.put_item_txn(&txn, &test_item("ITM1000000002", "ORD-A")).unwrap();
        storage.put_item_txn(&txn, &test_item("ITM1000000001", "ORD-A")).unwrap();
        storage.put_item_txn(&txn, &test_item("ITM1000000003", "ORD-B")).unwrap();
        txn.commit().unwrap();

        let items = storage.list_items_by_order("ORD-A").unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ITM1000000001", "ITM1000000002"]);
        assert_eq!(storage.list_items_by_order("ORD-C").unwrap().len(), 0);
    }

    #[test]
    fn test_upsert_does_not_duplicate_index() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let mut item = test_item("ITM1000000001", "ORD-A");

        let txn = storage.begin_write().unwrap();
        storage.put_item_txn(&txn, &item).unwrap();
        item.quantity = 4;
        storage.put_item_txn(&txn, &item).unwrap();
        txn.commit().unwrap();

        let items = storage.list_items_by_order("ORD-A").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 4);
    }

    #[test]
    fn test_allocation_skips_legacy_keys() {
        let storage = OrderStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        storage.put_order_txn(&txn, &test_order("ORD1000000007")).unwrap();
        storage.put_order_txn(&txn, &test_order("ORD99")).unwrap();
        storage.put_order_txn(&txn, &test_order("legacy-order")).unwrap();
        txn.commit().unwrap();

        let txn = storage.begin_write().unwrap();
        let id = storage.allocate_id_txn(&txn, IdScope::Orders).unwrap();
        txn.commit().unwrap();
        assert_eq!(id, "ORD1000000008");
    }

    #[test]
    fn test_uncommitted_allocation_is_released() {
        let storage = OrderStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        let first = storage.allocate_id_txn(&txn, IdScope::OrderItems).unwrap();
        drop(txn);

        let txn = storage.begin_write().unwrap();
        let second = storage.allocate_id_txn(&txn, IdScope::OrderItems).unwrap();
        txn.commit().unwrap();

        assert_eq!(first, second);
        assert_eq!(second, "ITM1000000001");
    }

    #[test]
    fn test_allocations_in_one_transaction_are_sequential() {
        let storage = OrderStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        let a = storage.allocate_id_txn(&txn, IdScope::OrderItems).unwrap();
        let b = storage.allocate_id_txn(&txn, IdScope::OrderItems).unwrap();
        txn.commit().unwrap();

        assert_eq!(a, "ITM1000000001");
        assert_eq!(b, "ITM1000000002");
    }

    #[test]
    fn test_remove_items_for_order() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let item = test_item("ITM1000000001", "ORD-A");

        let txn = storage.begin_write().unwrap();
        storage.put_item_txn(&txn, &item).unwrap();
        assert!(storage.ensure_shipment_txn(&txn, &item, 1).unwrap());
        txn.commit().unwrap();

        let txn = storage.begin_write().unwrap();
        let removed = storage.remove_items_for_order_txn(&txn, "ORD-A").unwrap();
        txn.commit().unwrap();

        assert_eq!(removed.len(), 1);
        assert!(storage.get_item("ITM1000000001").unwrap().is_none());
        assert!(storage.get_shipment("ITM1000000001").unwrap().is_none());
        assert!(storage.list_items_by_order("ORD-A").unwrap().is_empty());
    }

    #[test]
    fn test_ensure_shipment_is_idempotent() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let item = test_item("ITM1000000001", "ORD-A");

        let txn = storage.begin_write().unwrap();
        assert!(storage.ensure_shipment_txn(&txn, &item, 1).unwrap());
        assert!(!storage.ensure_shipment_txn(&txn, &item, 2).unwrap());
        txn.commit().unwrap();

        let shipment = storage.get_shipment("ITM1000000001").unwrap().unwrap();
        assert_eq!(shipment.status, "Order received");
        assert_eq!(shipment.created_at, 1);
    }
}
