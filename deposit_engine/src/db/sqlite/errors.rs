use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Could not create new user account: {0}")]
    AccountCreationError(String),
    #[error("Account not found: {0}")]
    AccountNotFound(i64),
    #[error("Transfer not found: {0}")]
    TransferNotFound(i64),
    #[error("Transfer {0} has status {1}, which is not creditable")]
    TransferNotCreditable(i64, String),
    #[error("Intent not found: {0}")]
    IntentNotFound(i64),
    #[error("Could not update transfer status: {0}")]
    TransferStatusUpdateError(String),
}
