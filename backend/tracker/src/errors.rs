//! Application-wide error types.
//!
//! Decode failures of individual contract payloads are *not* errors: the
//! transformers return `None` and the aggregator drops the entry. Only
//! systemic read failures, rejected preconditions and failed transactions
//! surface as [`TrackerError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Transaction(#[from] TxFailure),

    #[error("A transaction is already in flight")]
    Busy,
}

/// Checks made before anything is sent to the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Please connect your wallet")]
    NoWallet,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u128, available: u128 },
}

/// Why a dispatched write did not end in a successful receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxFailure {
    #[error("Transaction rejected by user")]
    Rejected,

    #[error("Transaction reverted")]
    Reverted,

    #[error("Timed out waiting for confirmation")]
    Timeout,

    #[error("Provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
