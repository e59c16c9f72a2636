//! Unified error system
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`AppError`]: Rich error type with codes, messages, and details
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::OrderNotFound);
//! assert_eq!(err.code.code(), 4001);
//!
//! let err = AppError::validation("quantity must be positive")
//!     .with_detail("field", "quantity");
//! assert!(err.details.is_some());
//! ```

mod codes;
mod types;

pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{AppError, AppResult};
