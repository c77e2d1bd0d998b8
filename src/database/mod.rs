//! Database layer for click-ledger
//!
//! This module defines the database trait and SQLite implementation.
//!
//! Every method is one atomic unit of work: a read-modify-write either
//! commits completely or leaves the stored state untouched.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{NamedCounter, Session, User};

/// Database trait for data persistence
///
/// This trait defines all database operations needed by the application.
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    // =========================================================================
    // User operations
    // =========================================================================

    /// Insert a new user
    ///
    /// Fails with `DbError::ConstraintViolation` if the username is taken.
    async fn insert_user(&self, user: &User) -> Result<(), DbError>;

    /// Get a user by username
    async fn get_user(&self, username: &str) -> Result<Option<User>, DbError>;

    // =========================================================================
    // Session operations
    // =========================================================================

    /// Insert a new session
    ///
    /// Fails with `DbError::NotFound` if the user does not exist.
    async fn insert_session(&self, session: &Session) -> Result<(), DbError>;

    /// Get a session by its token
    async fn get_session(&self, token: &str) -> Result<Option<Session>, DbError>;

    /// Delete a session by its token
    ///
    /// Returns whether a session was removed.
    async fn delete_session(&self, token: &str) -> Result<bool, DbError>;

    // =========================================================================
    // Counter operations
    // =========================================================================

    /// List all counters ordered by name
    async fn list_counters(&self) -> Result<Vec<NamedCounter>, DbError>;

    /// Insert a zeroed counter
    ///
    /// Fails with `DbError::ConstraintViolation` if the name is taken.
    async fn insert_counter(&self, name: &str) -> Result<(), DbError>;

    /// Increment a counter and stamp its last click time
    ///
    /// Returns the updated counter, or `DbError::NotFound`.
    async fn increment_counter(
        &self,
        name: &str,
        clicked_at: DateTime<Utc>,
    ) -> Result<NamedCounter, DbError>;

    /// Zero every counter and clear its last click time
    ///
    /// Returns the number of counters reset.
    async fn reset_counters(&self) -> Result<u64, DbError>;

    /// Delete a counter by name
    ///
    /// Fails with `DbError::NotFound` if absent.
    async fn delete_counter(&self, name: &str) -> Result<(), DbError>;

    // =========================================================================
    // Settings operations
    // =========================================================================

    /// Get the stored value per click, if any
    async fn get_value_per_click(&self) -> Result<Option<f64>, DbError>;

    /// Store the value per click
    async fn set_value_per_click(&self, value: f64) -> Result<(), DbError>;
}
