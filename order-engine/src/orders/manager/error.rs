use super::super::money::AmountOverflow;
use super::super::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Lifecycle errors
///
/// Everything here aborts the operation before its transaction commits.
/// Stock and hook failures are not errors at this level; they are reported
/// as warnings or logged.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Product cannot be resolved by the stock collaborator
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Item {item_id} does not belong to order {order_id}")]
    ItemOrderMismatch { item_id: String, order_id: String },

    /// ID allocation lost a race; retry the whole operation
    #[error("ID conflict: {0} already exists")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LifecycleError {
    /// Malformed input (bad quantity, status, reference)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LifecycleError::Validation(_)
                | LifecycleError::InvalidQuantity(_)
                | LifecycleError::InvalidStatus(_)
                | LifecycleError::ProductNotFound(_)
                | LifecycleError::ItemOrderMismatch { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LifecycleError::OrderNotFound(_) | LifecycleError::ItemNotFound(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LifecycleError::Conflict(_))
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(id) => LifecycleError::Conflict(id),
            other => LifecycleError::Storage(other),
        }
    }
}

impl From<AmountOverflow> for LifecycleError {
    fn from(err: AmountOverflow) -> Self {
        LifecycleError::Validation(err.to_string())
    }
}

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    match e {
        StorageError::Serialization(_) => ErrorCode::InternalError,
        StorageError::Conflict(_) => ErrorCode::IdConflict,
        // redb Database/Transaction/Table/Storage/Commit
        _ => ErrorCode::DatabaseError,
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
            LifecycleError::Validation(msg) => AppError::validation(msg),
            LifecycleError::InvalidQuantity(qty) => {
                AppError::with_message(ErrorCode::InvalidQuantity, format!("Invalid quantity: {qty}"))
                    .with_detail("quantity", qty)
            }
            LifecycleError::InvalidStatus(status) => {
                AppError::with_message(ErrorCode::InvalidStatus, format!("Invalid status: {status}"))
                    .with_detail("status", status)
            }
            LifecycleError::ProductNotFound(id) => {
                AppError::with_message(ErrorCode::ProductNotFound, format!("Product not found: {id}"))
                    .with_detail("productId", id)
            }
            LifecycleError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, format!("Order not found: {id}"))
                    .with_detail("orderId", id)
            }
            LifecycleError::ItemNotFound(id) => {
                AppError::with_message(ErrorCode::OrderItemNotFound, format!("Item not found: {id}"))
                    .with_detail("itemId", id)
            }
            LifecycleError::ItemOrderMismatch { item_id, order_id } => AppError::with_message(
                ErrorCode::ItemOrderMismatch,
                format!("Item {item_id} does not belong to order {order_id}"),
            )
            .with_detail("itemId", item_id)
            .with_detail("orderId", order_id),
            LifecycleError::Conflict(id) => {
                AppError::conflict(format!("ID conflict: {id} already exists")).with_detail("id", id)
            }
            LifecycleError::Internal(msg) => AppError::internal(msg),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
