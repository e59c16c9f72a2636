//! Unified error codes for the order engine
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 6xxx: Product / stock errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,

    // ==================== 4xxx: Order ====================
    /// Order does not exist
    OrderNotFound = 4001,
    /// Order item does not exist
    OrderItemNotFound = 4002,
    /// Concurrent writer took the generated ID, retry the whole operation
    IdConflict = 4003,
    /// Quantity must be positive
    InvalidQuantity = 4004,
    /// Unknown or malformed status value
    InvalidStatus = 4005,
    /// Item does not belong to the order
    ItemOrderMismatch = 4006,

    // ==================== 6xxx: Product / Stock ====================
    /// Product cannot be resolved by the catalog
    ProductNotFound = 6001,
    /// Stock record does not exist
    StockRecordNotFound = 6002,
    /// Stock collaborator failed to apply a delta
    StockUpdateFailed = 6003,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether the caller should retry the whole logical operation
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::IdConflict)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderItemNotFound => "Order item not found",
            ErrorCode::IdConflict => "Generated ID already taken, please retry",
            ErrorCode::InvalidQuantity => "Quantity must be positive",
            ErrorCode::InvalidStatus => "Invalid status",
            ErrorCode::ItemOrderMismatch => "Item does not belong to this order",

            // Product / Stock
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::StockRecordNotFound => "Stock record not found",
            ErrorCode::StockUpdateFailed => "Failed to update stock",

            // System
            ErrorCode::InternalError => "Internal error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            2 => Ok(ErrorCode::ValidationFailed),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderItemNotFound),
            4003 => Ok(ErrorCode::IdConflict),
            4004 => Ok(ErrorCode::InvalidQuantity),
            4005 => Ok(ErrorCode::InvalidStatus),
            4006 => Ok(ErrorCode::ItemOrderMismatch),

            // Product / Stock
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::StockRecordNotFound),
            6003 => Ok(ErrorCode::StockUpdateFailed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_through_u16() {
        for code in [
            ErrorCode::ValidationFailed,
            ErrorCode::OrderNotFound,
            ErrorCode::IdConflict,
            ErrorCode::StockUpdateFailed,
            ErrorCode::DatabaseError,
        ] {
            let raw: u16 = code.into();
            assert_eq!(ErrorCode::try_from(raw), Ok(code));
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
        assert_eq!(ErrorCode::try_from(0), Err(InvalidErrorCode(0)));
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&ErrorCode::OrderItemNotFound).unwrap();
        assert_eq!(json, "4002");
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(ErrorCode::IdConflict.is_retryable());
        assert!(!ErrorCode::OrderNotFound.is_retryable());
    }
}
