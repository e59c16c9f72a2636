//! Stock ledger collaborator
//!
//! The catalog/stock store is external to the engine; [`StockLedger`] is the
//! narrow contract the engine consumes. [`InMemoryStockLedger`] is a reference
//! implementation used by tests and local tooling.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::error::{AppError, ErrorCode};
use shared::order::StockRecord;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Stock collaborator errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StockError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Stock record {stock_record_id} not found for product {product_id}")]
    RecordNotFound {
        product_id: String,
        stock_record_id: String,
    },

    /// Store unreachable, rejected write, ...
    #[error("Stock update failed: {0}")]
    Unavailable(String),
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        let code = match &err {
            StockError::ProductNotFound(_) => ErrorCode::ProductNotFound,
            StockError::RecordNotFound { .. } => ErrorCode::StockRecordNotFound,
            StockError::Unavailable(_) => ErrorCode::StockUpdateFailed,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Quantity-tracking collaborator
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// All stock records of a product (one per variant, typically)
    async fn get_stock_for_product(&self, product_id: &str) -> Result<Vec<StockRecord>, StockError>;

    /// Apply a signed delta; returns the new quantity.
    ///
    /// The result is `max(0, current + delta)`. Flooring at zero is not an
    /// error. Must be atomic per stock record.
    async fn apply_delta(
        &self,
        product_id: &str,
        stock_record_id: &str,
        delta: i64,
    ) -> Result<i64, StockError>;

    /// Product display name, if the collaborator knows one
    async fn product_name(&self, _product_id: &str) -> Result<Option<String>, StockError> {
        Ok(None)
    }
}

/// Pick the stock record an item refers to
///
/// Explicit `stock_record_id` first, then a variant match, then the first record.
pub fn select_stock_record<'a>(
    records: &'a [StockRecord],
    variant_id: Option<&str>,
    stock_record_id: Option<&str>,
) -> Option<&'a StockRecord> {
    if let Some(id) = stock_record_id {
        return records.iter().find(|r| r.id == id);
    }
    if let Some(variant) = variant_id
        && let Some(record) = records.iter().find(|r| r.variant_id.as_deref() == Some(variant))
    {
        return Some(record);
    }
    records.first()
}

// ============================================================================
// In-memory ledger
// ============================================================================

#[derive(Debug, Default)]
struct LedgerState {
    /// product_id → records
    records: HashMap<String, Vec<StockRecord>>,
    names: HashMap<String, String>,
    /// products whose `apply_delta` fails (fault injection)
    failing: HashSet<String>,
}

/// Process-local ledger guarded by a single mutex
///
/// Every `apply_delta` is a read-modify-write under the lock, so concurrent
/// restores of the same record are never lost.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product with a single stock record
    pub fn with_product(
        self,
        product_id: &str,
        name: &str,
        stock_record_id: &str,
        quantity: i64,
        price: f64,
    ) -> Self {
        self.set_product_name(product_id, name);
        self.insert_record(StockRecord {
            id: stock_record_id.to_string(),
            product_id: product_id.to_string(),
            variant_id: None,
            quantity,
            price,
        });
        self
    }

    /// Insert or replace a stock record
    pub fn insert_record(&self, record: StockRecord) {
        let mut state = self.state.lock();
        let records = state.records.entry(record.product_id.clone()).or_default();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn set_product_name(&self, product_id: &str, name: &str) {
        self.state
            .lock()
            .names
            .insert(product_id.to_string(), name.to_string());
    }

    /// Current quantity of one record
    pub fn quantity(&self, product_id: &str, stock_record_id: &str) -> Option<i64> {
        let state = self.state.lock();
        state
            .records
            .get(product_id)?
            .iter()
            .find(|r| r.id == stock_record_id)
            .map(|r| r.quantity)
    }

    /// Make every `apply_delta` for `product_id` fail until cleared
    pub fn fail_deltas_for(&self, product_id: &str) {
        self.state.lock().failing.insert(product_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn get_stock_for_product(&self, product_id: &str) -> Result<Vec<StockRecord>, StockError> {
        let state = self.state.lock();
        match state.records.get(product_id) {
            Some(records) if !records.is_empty() => Ok(records.clone()),
            _ => Err(StockError::ProductNotFound(product_id.to_string())),
        }
    }

    async fn apply_delta(
        &self,
        product_id: &str,
        stock_record_id: &str,
        delta: i64,
    ) -> Result<i64, StockError> {
        let mut state = self.state.lock();
        if state.failing.contains(product_id) {
            return Err(StockError::Unavailable(format!(
                "stock store rejected delta {delta} for {product_id}"
            )));
        }

        let record = state
            .records
            .get_mut(product_id)
            .ok_or_else(|| StockError::ProductNotFound(product_id.to_string()))?
            .iter_mut()
            .find(|r| r.id == stock_record_id)
            .ok_or_else(|| StockError::RecordNotFound {
                product_id: product_id.to_string(),
                stock_record_id: stock_record_id.to_string(),
            })?;

        let raw = record.quantity.saturating_add(delta);
        if raw < 0 {
            tracing::warn!(
                product_id = %product_id,
                stock_record_id = %stock_record_id,
                current = record.quantity,
                delta = delta,
                "Stock delta would go negative, flooring at zero"
            );
        }
        record.quantity = raw.max(0);
        Ok(record.quantity)
    }

    async fn product_name(&self, product_id: &str) -> Result<Option<String>, StockError> {
        Ok(self.state.lock().names.get(product_id).cloned())
    }
}
