//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.
//!
//! All calls are executed in order on the single background thread owned by
//! the tokio-rusqlite connection, so each read-modify-write below runs without
//! interleaving with any other store operation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::Database;
use crate::error::DbError;
use crate::models::{CounterState, NamedCounter, Session, User, VALUE_PER_CLICK_KEY};

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    /// Missing parent directories of a file path are created.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        DbError::Connection(format!("Failed to create {}: {}", parent.display(), e))
                    })?;
                }
            }
        }

        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn insert_user(&self, user: &User) -> Result<(), DbError> {
        let username = user.username.clone();
        let password_hash = user.password_hash.clone();
        let created_at = user.created_at.to_rfc3339();

        let inserted = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    r#"
                    INSERT OR IGNORE INTO users (username, password_hash, created_at)
                    VALUES (?1, ?2, ?3)
                    "#,
                    rusqlite::params![username, password_hash, created_at],
                )?;
                Ok(count)
            })
            .await?;

        if inserted == 0 {
            return Err(DbError::ConstraintViolation(format!(
                "username '{}' already exists",
                user.username
            )));
        }

        Ok(())
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT username, password_hash, created_at FROM users WHERE username = ?1",
                        [&username],
                        |row| {
                            Ok(User {
                                username: row.get(0)?,
                                password_hash: row.get(1)?,
                                created_at: parse_datetime(row.get::<_, Option<String>>(2)?)
                                    .unwrap_or_else(Utc::now),
                            })
                        },
                    )
                    .optional()?;

                Ok(user)
            })
            .await
            .map_err(Into::into)
    }

    // =========================================================================
    // Session operations
    // =========================================================================

    async fn insert_session(&self, session: &Session) -> Result<(), DbError> {
        let token = session.token.clone();
        let username = session.username.clone();
        let created_at = session.created_at.to_rfc3339();
        let expires_at = session.expires_at.map(|t| t.to_rfc3339());

        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let user_exists = tx
                    .query_row(
                        "SELECT 1 FROM users WHERE username = ?1",
                        [&username],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();

                if !user_exists {
                    return Ok(false);
                }

                tx.execute(
                    r#"
                    INSERT INTO sessions (token, username, created_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    rusqlite::params![token, username, created_at, expires_at],
                )?;
                tx.commit()?;

                Ok(true)
            })
            .await?;

        if !inserted {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>, DbError> {
        let token = token.to_string();

        self.conn
            .call(move |conn| {
                let session = conn
                    .query_row(
                        r#"
                        SELECT token, username, created_at, expires_at
                        FROM sessions
                        WHERE token = ?1
                        "#,
                        [&token],
                        |row| {
                            Ok(Session {
                                token: row.get(0)?,
                                username: row.get(1)?,
                                created_at: parse_datetime(row.get::<_, Option<String>>(2)?)
                                    .unwrap_or_else(Utc::now),
                                expires_at: parse_datetime(row.get::<_, Option<String>>(3)?),
                            })
                        },
                    )
                    .optional()?;

                Ok(session)
            })
            .await
            .map_err(Into::into)
    }

    async fn delete_session(&self, token: &str) -> Result<bool, DbError> {
        let token = token.to_string();

        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute("DELETE FROM sessions WHERE token = ?1", [&token])?;
                Ok(count)
            })
            .await?;

        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Counter operations
    // =========================================================================

    async fn list_counters(&self) -> Result<Vec<NamedCounter>, DbError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT name, count, last_clicked_at
                    FROM counters
                    ORDER BY name
                    "#,
                )?;

                let counters = stmt
                    .query_map([], counter_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(counters)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_counter(&self, name: &str) -> Result<(), DbError> {
        let owned = name.to_string();

        let inserted = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    "INSERT OR IGNORE INTO counters (name, count, last_clicked_at) VALUES (?1, 0, NULL)",
                    [&owned],
                )?;
                Ok(count)
            })
            .await?;

        if inserted == 0 {
            return Err(DbError::ConstraintViolation(format!(
                "counter '{}' already exists",
                name
            )));
        }

        Ok(())
    }

    async fn increment_counter(
        &self,
        name: &str,
        clicked_at: DateTime<Utc>,
    ) -> Result<NamedCounter, DbError> {
        let name = name.to_string();
        let clicked_at = clicked_at.to_rfc3339();

        let counter = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let updated = tx.execute(
                    r#"
                    UPDATE counters
                    SET count = count + 1, last_clicked_at = ?1
                    WHERE name = ?2
                    "#,
                    rusqlite::params![clicked_at, name],
                )?;

                if updated == 0 {
                    return Ok(None);
                }

                let counter = tx.query_row(
                    "SELECT name, count, last_clicked_at FROM counters WHERE name = ?1",
                    [&name],
                    counter_from_row,
                )?;
                tx.commit()?;

                Ok(Some(counter))
            })
            .await?;

        counter.ok_or(DbError::NotFound)
    }

    async fn reset_counters(&self) -> Result<u64, DbError> {
        self.conn
            .call(|conn| {
                let count =
                    conn.execute("UPDATE counters SET count = 0, last_clicked_at = NULL", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Into::into)
    }

    async fn delete_counter(&self, name: &str) -> Result<(), DbError> {
        let name = name.to_string();

        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute("DELETE FROM counters WHERE name = ?1", [&name])?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    // =========================================================================
    // Settings operations
    // =========================================================================

    async fn get_value_per_click(&self) -> Result<Option<f64>, DbError> {
        self.conn
            .call(|conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM settings WHERE key = ?1",
                        [VALUE_PER_CLICK_KEY],
                        |row| row.get::<_, f64>(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
            .map_err(Into::into)
    }

    async fn set_value_per_click(&self, value: f64) -> Result<(), DbError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO settings (key, value) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value
                    "#,
                    rusqlite::params![VALUE_PER_CLICK_KEY, value],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }
}

/// Map a `name, count, last_clicked_at` row to a counter
fn counter_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NamedCounter> {
    Ok(NamedCounter {
        name: row.get(0)?,
        state: CounterState {
            count: row.get::<_, i64>(1)?.max(0) as u64,
            last_clicked_at: parse_datetime(row.get::<_, Option<String>>(2)?),
        },
    })
}

/// Parse a datetime string to DateTime<Utc>
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // Try parsing SQLite's datetime format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}
