//! Authentication system for click-ledger
//!
//! This module provides authentication functionality:
//! - User registration with Argon2id password hashes
//! - Login sessions with opaque bearer tokens
//! - Rate limiting for failed logins

pub mod manager;
pub mod password;
pub mod ratelimit;
pub mod token;

pub use manager::{AuthConfig, AuthManager};
pub use password::{hash_password, verify_password, HashError};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use token::{generate_session_token, is_valid_token_format, TOKEN_PREFIX};
