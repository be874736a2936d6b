//! Common error types for MRS

use thiserror::Error;

/// Common result type for MRS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across MRS crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness violation (slug, email, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error is a UNIQUE constraint violation reported by SQLite
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }

    /// Message of the underlying database error, if any
    pub fn database_message(&self) -> Option<&str> {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => Some(db_err.message()),
            _ => None,
        }
    }
}
