//! Order Module
//!
//! Types shared by the order lifecycle engine and its callers:
//! - Records: orders, order items, shipments (persisted documents)
//! - Drafts: caller input for creating/editing orders and items
//! - Status: the closed status vocabulary

pub mod status;
pub mod types;

// Re-exports
pub use status::OrderStatus;
pub use types::*;
