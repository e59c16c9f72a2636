//! Shared types for the order engine
//!
//! Persisted record shapes (orders, order items, stock records, shipments),
//! the closed status vocabulary and the unified error codes used by every
//! crate in the workspace.

pub mod error;
pub mod order;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult, ErrorCode};
pub use order::{Order, OrderItem, OrderStatus};
pub use serde::{Deserialize, Serialize};
