//! Authentication manager
//!
//! This module provides the credential store and session authenticator:
//! registration, login, logout and bearer-token resolution.

use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;

use crate::database::Database;
use crate::error::{AuthError, DbError};
use crate::models::{Credentials, Identity, LoginResponse, Session, User};

use super::password::{hash_password, verify_password};
use super::ratelimit::{RateLimitConfig, RateLimiter};
use super::token::{generate_session_token, is_valid_token_format};

/// Configuration for the authentication manager
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Session lifetime (None = sessions never expire)
    pub session_ttl: Option<Duration>,

    /// Failed-login rate limit configuration
    pub rate_limit: RateLimitConfig,
}

/// Authentication manager
///
/// Owns the credential ledger (users and sessions) through the database
/// handle and throttles failed logins per client IP.
pub struct AuthManager<D: Database> {
    db: Arc<D>,
    config: AuthConfig,
    rate_limiter: RateLimiter,
}

impl<D: Database> AuthManager<D> {
    /// Create a new authentication manager
    pub fn new(db: Arc<D>, config: AuthConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());
        Self {
            db,
            config,
            rate_limiter,
        }
    }

    /// Register a new user
    ///
    /// Fails with `UserExists` if the username is taken.
    pub async fn register(&self, credentials: &Credentials) -> Result<User, AuthError> {
        if credentials.username.is_empty() {
            return Err(AuthError::InvalidInput("username must not be empty".into()));
        }
        if credentials.password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".into()));
        }

        let password_hash = hash_password(&credentials.password)?;
        let user = User::new(&credentials.username, password_hash);

        match self.db.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(username = %user.username, "User registered");
                Ok(user)
            }
            Err(DbError::ConstraintViolation(_)) => {
                Err(AuthError::UserExists(credentials.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Log a user in and issue a fresh session token
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the
    /// caller. Failures are counted per `ip` when one is known.
    pub async fn login(
        &self,
        credentials: &Credentials,
        ip: Option<IpAddr>,
    ) -> Result<LoginResponse, AuthError> {
        if let Some(ip) = ip {
            if let Some(retry_after) = self.rate_limiter.remaining_block_time(ip) {
                tracing::warn!(
                    %ip,
                    retry_after_secs = retry_after.as_secs(),
                    "Login rejected: rate limited"
                );
                return Err(AuthError::RateLimited { retry_after });
            }
        }

        let user = self.db.get_user(&credentials.username).await?;

        let verified = match &user {
            Some(user) => verify_password(&credentials.password, &user.password_hash),
            None => {
                // Burn the same hashing cost as a real check
                if let Some(hash) = dummy_hash() {
                    verify_password(&credentials.password, hash);
                }
                false
            }
        };

        if !verified {
            if let Some(ip) = ip {
                let blocked = self.rate_limiter.record_failure(ip);
                tracing::warn!(
                    %ip,
                    failures = self.rate_limiter.failure_count(ip),
                    blocked,
                    "Failed login recorded"
                );
            }
            tracing::warn!(username = %credentials.username, "Login failed");
            return Err(AuthError::InvalidCredentials);
        }

        if let Some(ip) = ip {
            self.rate_limiter.reset(ip);
        }

        let token = generate_session_token();
        let mut session = Session::new(&token, &credentials.username);
        if let Some(ttl) = self.config.session_ttl {
            let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
            session = session.with_expires_at(
                Utc::now()
                    .checked_add_signed(ttl)
                    .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC),
            );
        }

        match self.db.insert_session(&session).await {
            Ok(()) => {}
            Err(DbError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(username = %session.username, "User logged in");

        Ok(LoginResponse {
            token,
            username: session.username,
        })
    }

    /// End a session
    ///
    /// Idempotent: a missing or unknown token is not an error. Returns
    /// whether a session was removed.
    pub async fn logout(&self, token: Option<&str>) -> Result<bool, AuthError> {
        let Some(token) = token.filter(|t| is_valid_token_format(t)) else {
            return Ok(false);
        };

        let removed = self.db.delete_session(token).await?;

        if removed {
            tracing::info!("Session ended");
        }

        Ok(removed)
    }

    /// Look up the identity behind a session token without mutating anything
    ///
    /// Malformed, unknown and expired tokens all resolve to `None`.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        if !is_valid_token_format(token) {
            return Ok(None);
        }

        let session = self.db.get_session(token).await?;

        Ok(session
            .filter(|s| s.is_active())
            .map(|s| Identity::from(&s)))
    }

    /// Gate for mutating requests: resolve the bearer token or reject
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token.ok_or(AuthError::MissingAuth)?;

        self.resolve_session(token)
            .await?
            .ok_or(AuthError::InvalidToken)
    }
}

/// Hash verified against when the username does not exist
fn dummy_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    DUMMY_HASH
        .get_or_init(|| hash_password("click-ledger-dummy-password").ok())
        .as_deref()
}
