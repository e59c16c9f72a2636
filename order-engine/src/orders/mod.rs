//! Order lifecycle and inventory reconciliation
//!
//! - **ids**: sequential `ORD` / `ITM` identifiers
//! - **stock**: stock collaborator contract + in-memory ledger
//! - **status_policy**: sub-status table and status → stock action mapping
//! - **item_store**: line item persistence
//! - **aggregator**: order status / amounts derived from its items
//! - **hooks**: analytics / notification collaborator
//! - **storage**: redb persistence
//! - **manager**: OrderLifecycleService, the public operations
//!
//! # Architecture
//!
//! ```text
//! caller → OrderLifecycleService ─┬─ ids ──────────┐
//!                                 ├─ item_store ───┼─ storage (redb, one txn)
//!                                 ├─ aggregator ───┘
//!                                 ├─ status_policy → StockLedger (after commit)
//!                                 └─ OrderHooks (after commit)
//! ```

pub mod aggregator;
pub mod hooks;
pub mod ids;
pub mod item_store;
pub mod manager;
pub mod money;
pub mod status_policy;
pub mod stock;
pub mod storage;

// Re-exports
pub use aggregator::{OrderAggregate, OrderAggregator, TotalBasis};
pub use hooks::{BroadcastHooks, HookError, NoopHooks, OrderHooks, OrderNotification};
pub use ids::{IdScope, SequentialIdGenerator};
pub use item_store::OrderItemStore;
pub use manager::{
    CancelOrderOutcome, LifecycleError, LifecycleResult, OperationReport, OrderLifecycleService,
    StockWarning, retry_on_conflict,
};
pub use status_policy::{StatusPolicy, StockAction};
pub use stock::{InMemoryStockLedger, StockError, StockLedger};
pub use storage::{OrderStorage, StorageError, StorageResult};

// Re-export shared types for convenience
pub use shared::order::{
    Order, OrderDraft, OrderItem, OrderItemDraft, OrderStatus, Shipment, StockRecord,
};
