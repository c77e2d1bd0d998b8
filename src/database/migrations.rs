//! Database migrations for click-ledger
//!
//! This module contains SQL migrations for the SQLite database schema.
//! The counter ledger lives in `counters` and `settings`, the credential
//! ledger in `users` and `sessions`.

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Counter ledger: one row per named counter
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY NOT NULL,
    count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
    last_clicked_at TEXT
);

-- Counter ledger: process-wide settings (valuePerClick)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value REAL NOT NULL
);

-- Credential ledger: registered users
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Credential ledger: active login sessions
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL REFERENCES users(username),
    created_at TEXT NOT NULL,
    expires_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_username ON sessions(username);

PRAGMA user_version = 1;
"#;

/// Get the migration version
pub fn migration_version() -> i32 {
    1
}
