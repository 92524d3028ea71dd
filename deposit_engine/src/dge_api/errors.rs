use thiserror::Error;

use crate::{chain::ChainReaderError, config::ConfigError};

#[derive(Debug, Error)]
pub enum DepositApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Account not found: {0}")]
    AccountNotFound(i64),
    #[error("Deposit intent not found: {0}")]
    IntentNotFound(i64),
    #[error("No transfer {0}:{1} is recorded")]
    TransferNotFound(String, i64),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Chain read failed: {0}")]
    ChainError(#[from] ChainReaderError),
    #[error("Scanner is misconfigured: {0}")]
    ConfigError(#[from] ConfigError),
}
