//! Error types for TideKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TideError
pub type Result<T> = std::result::Result<T, TideError>;

/// Unified error type for TideKV operations
#[derive(Debug, Error)]
pub enum TideError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL / Segment Errors
    // -------------------------------------------------------------------------
    #[error("wal failure")]
    WalFailure,

    #[error("corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    // -------------------------------------------------------------------------
    // Transaction Errors
    // -------------------------------------------------------------------------
    #[error("transaction interfered")]
    TransactionInterfered,

    #[error("transaction finished")]
    TransactionFinished,

    #[error("invalid transaction")]
    InvalidTransaction,

    #[error("transaction already started")]
    TransactionInProgress,

    // -------------------------------------------------------------------------
    // Replication Errors
    // -------------------------------------------------------------------------
    #[error("replica does not support writes")]
    ReplicaReadOnly,

    #[error("replication error: {0}")]
    Replication(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("network error: {0}")]
    Network(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for TideError {
    fn from(err: bincode::Error) -> Self {
        TideError::Serialization(err.to_string())
    }
}
