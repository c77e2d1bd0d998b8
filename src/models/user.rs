//! Credential domain models
//!
//! This module defines registered users, login sessions and the request and
//! response payloads of the credential endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered user stored in the credential ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique username (exact match, no normalization)
    pub username: String,

    /// Argon2id hash in PHC string format
    pub password_hash: String,

    /// When the user registered
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user record
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

/// Login session mapping an opaque token to a username
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Raw session token
    pub token: String,

    /// Username the session belongs to
    pub username: String,

    /// When the session was issued
    pub created_at: DateTime<Utc>,

    /// When the session stops being accepted (None = never)
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session that never expires
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Set expiration time
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check if the session is still accepted at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }

    /// Check if the session is still accepted
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}

/// Identity resolved from a valid session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Acting username
    pub username: String,
}

impl From<&Session> for Identity {
    fn from(session: &Session) -> Self {
        Self {
            username: session.username.clone(),
        }
    }
}

/// Username/password pair used by register and login
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keeps passwords out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Response returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Raw session token (bearer value for later requests)
    pub token: String,

    /// Username the session belongs to
    pub username: String,
}
