//! Application error types for click-ledger
//!
//! This module defines the error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use thiserror::Error;

use crate::auth::HashError;

/// Authentication-related errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Session token is unknown, malformed or expired
    #[error("Invalid token")]
    InvalidToken,

    /// Wrong username or password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingAuth,

    /// Username already registered
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Rejected registration input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rate limited due to too many failed attempts
    #[error("Rate limited: too many failed attempts")]
    RateLimited {
        /// Time until the block lifts
        retry_after: Duration,
    },

    /// Password could not be hashed
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] HashError),

    /// Credential store could not be read or written
    #[error("Credential storage failure: {0}")]
    Storage(#[from] DbError),
}

/// Counter ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A counter with this name already exists
    #[error("Name already exists: {0}")]
    NameExists(String),

    /// The name collides with the reserved configuration key
    #[error("Name is reserved: {0}")]
    ReservedName(String),

    /// No counter with this name
    #[error("Name not found: {0}")]
    NameNotFound(String),

    /// Rejected counter name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Ledger storage could not be read or written
    #[error("Ledger storage failure: {0}")]
    Storage(#[from] DbError),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Background connection failure
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => DbError::Sqlite(e),
            other => DbError::Connection(other.to_string()),
        }
    }
}

/// Application-level error type
///
/// This is the error type returned by HTTP handlers. It aggregates the
/// domain-specific error types; the server module maps it onto status codes.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Request body missing, not JSON, or of the wrong shape
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
}
