//! HTTP middleware for click-ledger
//!
//! This module provides middleware for:
//! - Session authentication of mutating routes
//! - Request/response logging

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::AuthManager;
use crate::database::Database;
use crate::error::AuthError;
use crate::models::Identity;

/// Routes reachable without a session, regardless of method
const PUBLIC_PATHS: &[&str] = &["/health", "/api/register", "/api/login", "/api/logout"];

/// Identity of the caller, attached to authenticated requests
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub Identity);

/// Whether a route is served without authentication
///
/// Reads (`GET`/`HEAD`) and the credential endpoints are public; every other
/// request must carry a valid session.
pub fn is_public_route(method: &Method, path: &str) -> bool {
    method == Method::GET || method == Method::HEAD || PUBLIC_PATHS.contains(&path)
}

/// Extract the session token from the `Authorization` header
///
/// Accepts `Bearer <token>` (scheme matched case-insensitively) as well as a
/// bare token.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    const SCHEME: &str = "bearer";

    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();

    let token = match (value.get(..SCHEME.len()), value.get(SCHEME.len()..)) {
        (Some(scheme), Some(rest))
            if scheme.eq_ignore_ascii_case(SCHEME) && (rest.is_empty() || rest.starts_with(' ')) =>
        {
            rest.trim()
        }
        _ => value,
    };
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Authentication middleware function
///
/// This middleware:
/// 1. Lets public routes through untouched
/// 2. Extracts the session token from the Authorization header
/// 3. Resolves it to an identity, rejecting the request before any handler runs
/// 4. Adds the authenticated user to the request extensions
pub async fn auth_middleware<D: Database + 'static>(
    State(auth_manager): State<Arc<AuthManager<D>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthResponse> {
    if is_public_route(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = extract_token(request.headers()).map(str::to_owned);
    let identity = auth_manager
        .authenticate(token.as_deref())
        .await
        .map_err(AuthResponse::from_error)?;

    tracing::debug!(
        username = %identity.username,
        path = %request.uri().path(),
        "Request authenticated"
    );

    request.extensions_mut().insert(AuthenticatedUser(identity));

    Ok(next.run(request).await)
}

/// Authentication error response
pub struct AuthResponse {
    status: StatusCode,
    message: String,
    retry_after: Option<Duration>,
}

impl AuthResponse {
    /// Map an authentication failure onto a status and client-facing message
    pub fn from_error(error: AuthError) -> Self {
        let mut retry_after = None;
        let (status, message) = match error {
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Not logged in".to_string()),
            AuthError::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "Missing authorization header".to_string(),
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            ),
            AuthError::RateLimited { retry_after: wait } => {
                retry_after = Some(wait);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many failed attempts. Please try again later.".to_string(),
                )
            }
            AuthError::UserExists(_) => {
                (StatusCode::BAD_REQUEST, "User already exists".to_string())
            }
            AuthError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::Hashing(e) => {
                tracing::error!(error = %e, "Password hashing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AuthError::Storage(e) => {
                tracing::error!(error = %e, "Credential storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        Self {
            status,
            message,
            retry_after,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response();

        if let Some(wait) = self.retry_after {
            // Whole seconds, rounded up
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

/// Logging middleware function
///
/// Logs method, path, status code and response time of every request.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}
