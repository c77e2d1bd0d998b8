//! Session token generation
//!
//! Tokens use the `cl_` prefix followed by 32 bytes of random data encoded in
//! URL-safe Base64. They are opaque to clients and stored verbatim as the
//! session key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

/// Token prefix for click-ledger session tokens
pub const TOKEN_PREFIX: &str = "cl_";

/// Length of the random part of the token in bytes
const TOKEN_RANDOM_BYTES: usize = 32;

/// Generate a new session token
///
/// # Example
///
/// ```
/// use click_ledger::auth::token::{generate_session_token, is_valid_token_format};
///
/// let token = generate_session_token();
/// assert!(token.starts_with("cl_"));
/// assert!(is_valid_token_format(&token));
/// ```
pub fn generate_session_token() -> String {
    let mut random_bytes = [0u8; TOKEN_RANDOM_BYTES];
    OsRng.fill_bytes(&mut random_bytes);

    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(random_bytes))
}

/// Check if a token has the correct format
///
/// Valid tokens start with `cl_` and carry exactly 32 base64-encoded bytes.
pub fn is_valid_token_format(token: &str) -> bool {
    let Some(body) = token.strip_prefix(TOKEN_PREFIX) else {
        return false;
    };

    match URL_SAFE_NO_PAD.decode(body) {
        Ok(bytes) => bytes.len() == TOKEN_RANDOM_BYTES,
        Err(_) => false,
    }
}
