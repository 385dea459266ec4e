use thiserror::Error;

use crate::domain::{BalanceOutOfRange, ParseCentsError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Office not found: {0}")]
    OfficeNotFound(String),

    #[error("Vendor not found: {0}")]
    VendorNotFound(String),

    #[error("Petty-cash entry not found: {0}")]
    TransactionNotFound(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Role '{actual}' is not allowed to perform an action requiring '{required}'")]
    Forbidden { required: String, actual: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    /// Build a validation error for an amount field.
    pub fn invalid_amount(field: &str, err: ParseCentsError) -> Self {
        AppError::Validation(format!("{}: {}", field, err))
    }
}

impl From<BalanceOutOfRange> for AppError {
    fn from(err: BalanceOutOfRange) -> Self {
        AppError::Validation(err.to_string())
    }
}
