//! HTTP router for click-ledger
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Counter ledger reads and mutations under `/api`
//! - Registration, login and logout under `/api`

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::middleware::{auth_middleware, extract_token, AuthResponse, AuthenticatedUser};
use crate::auth::AuthManager;
use crate::database::Database;
use crate::error::{AppError, LedgerError};
use crate::ledger::Ledger;
use crate::models::{AddNameRequest, CounterMap, Credentials, LedgerSettings, LoginResponse};

/// Shared application state
pub struct AppState<D: Database> {
    /// Credential store and session authenticator
    pub auth_manager: Arc<AuthManager<D>>,

    /// Counter ledger
    pub ledger: Arc<Ledger<D>>,
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            auth_manager: Arc::clone(&self.auth_manager),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Body of successful mutations
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn message(status: StatusCode, text: &str) -> (StatusCode, Json<MessageResponse>) {
    (
        status,
        Json(MessageResponse {
            message: text.to_string(),
        }),
    )
}

/// Build the main application router
///
/// Every route passes through the session middleware; reads and the
/// credential endpoints are let through without a token.
pub fn build_router<D: Database + 'static>(state: AppState<D>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Counter ledger
        .route("/api/names", get(list_names_handler::<D>))
        .route("/api/config", get(get_config_handler::<D>))
        .route("/api/config", post(set_config_handler::<D>))
        .route("/api/add", post(add_name_handler::<D>))
        .route("/api/increment/:name", post(increment_handler::<D>))
        .route("/api/reset", post(reset_handler::<D>))
        .route("/api/delete/:name", delete(delete_name_handler::<D>))
        // Credentials
        .route("/api/register", post(register_handler::<D>))
        .route("/api/login", post(login_handler::<D>))
        .route("/api/logout", post(logout_handler::<D>))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth_manager),
            auth_middleware::<D>,
        ))
        .with_state(state)
}

// =============================================================================
// Health Handler
// =============================================================================

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Counter Ledger Handlers
// =============================================================================

async fn list_names_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
) -> Result<Json<CounterMap>, AppError> {
    Ok(Json(state.ledger.list_counters().await?))
}

async fn get_config_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
) -> Result<Json<LedgerSettings>, AppError> {
    Ok(Json(state.ledger.get_config().await?))
}

async fn set_config_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Result<Json<LedgerSettings>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(settings) = body?;
    state.ledger.set_config(settings).await?;
    tracing::info!(username = %user.username, "Value per click changed");

    Ok(message(StatusCode::OK, "Value saved"))
}

async fn add_name_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Result<Json<AddNameRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    state.ledger.add_counter(&req.name).await?;
    tracing::info!(username = %user.username, name = %req.name, "Name added");

    Ok(message(StatusCode::CREATED, "Name added"))
}

async fn increment_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let counter = state.ledger.increment(&name).await?;
    tracing::debug!(
        username = %user.username,
        name = %name,
        count = counter.state.count,
        "Click recorded"
    );

    Ok(message(StatusCode::OK, "Counter incremented"))
}

async fn reset_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let reset = state.ledger.reset().await?;
    tracing::info!(username = %user.username, counters = reset, "All counters reset");

    Ok(message(StatusCode::OK, "Counters reset"))
}

async fn delete_name_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.ledger.delete_counter(&name).await?;
    tracing::info!(username = %user.username, name = %name, "Name deleted");

    Ok(message(StatusCode::OK, "Name deleted"))
}

// =============================================================================
// Credential Handlers
// =============================================================================

async fn register_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(credentials) = body?;
    state.auth_manager.register(&credentials).await?;

    Ok(message(StatusCode::CREATED, "User registered"))
}

async fn login_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(credentials) = body?;
    let ip = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let response = state.auth_manager.login(&credentials, ip).await?;

    Ok(Json(response))
}

async fn logout_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state.auth_manager.logout(extract_token(&headers)).await?;

    Ok(message(StatusCode::OK, "Logged out"))
}

// =============================================================================
// Error Responses
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Auth(e) => return AuthResponse::from_error(e).into_response(),
            AppError::Ledger(LedgerError::NameExists(_)) => {
                (StatusCode::BAD_REQUEST, "Name already exists".to_string())
            }
            AppError::Ledger(LedgerError::ReservedName(name)) => (
                StatusCode::BAD_REQUEST,
                format!("'{}' is a reserved name", name),
            ),
            AppError::Ledger(LedgerError::InvalidName(msg)) => (StatusCode::BAD_REQUEST, msg),
            AppError::Ledger(LedgerError::NameNotFound(_)) => {
                (StatusCode::NOT_FOUND, "Name not found".to_string())
            }
            AppError::InvalidBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            other => {
                tracing::error!(error = %other, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, AuthManager};
    use crate::database::{MockDatabase, SqliteDatabase};
    use crate::error::DbError;
    use crate::models::DEFAULT_VALUE_PER_CLICK;
    use axum::http::{header, HeaderValue};
    use axum_test::TestServer;

    fn state_for<D: Database + 'static>(db: D) -> AppState<D> {
        let db = Arc::new(db);
        AppState {
            auth_manager: Arc::new(AuthManager::new(Arc::clone(&db), AuthConfig::default())),
            ledger: Arc::new(Ledger::new(db, DEFAULT_VALUE_PER_CLICK)),
        }
    }

    async fn create_test_server() -> TestServer {
        let db = SqliteDatabase::in_memory().await.unwrap();
        TestServer::new(build_router(state_for(db))).unwrap()
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    async fn register_and_login(server: &TestServer, username: &str, password: &str) -> String {
        server
            .post("/api/register")
            .json(&serde_json::json!({ "username": username, "password": password }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/login")
            .json(&serde_json::json!({ "username": username, "password": password }))
            .await;
        response.assert_status_ok();
        response.json::<LoginResponse>().token
    }

    // Test 1: Health endpoint returns OK
    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let server = create_test_server().await;

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert!(!body.version.is_empty());
    }

    // Test 2: Names and config are public
    #[tokio::test]
    async fn test_public_reads() {
        let server = create_test_server().await;

        let response = server.get("/api/names").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({}));

        let response = server.get("/api/config").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "valuePerClick": 0.5 }));
    }

    // Test 3: Register, login and add a name
    #[tokio::test]
    async fn test_register_login_add_scenario() {
        let server = create_test_server().await;

        server
            .post("/api/register")
            .json(&serde_json::json!({ "username": "bilal", "password": "pw1" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/register")
            .json(&serde_json::json!({ "username": "bilal", "password": "pw2" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&serde_json::json!({ "error": "User already exists" }));

        server
            .post("/api/login")
            .json(&serde_json::json!({ "username": "bilal", "password": "pw2" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/api/login")
            .json(&serde_json::json!({ "username": "bilal", "password": "pw1" }))
            .await;
        response.assert_status_ok();
        let login: LoginResponse = response.json();
        assert_eq!(login.username, "bilal");

        server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&login.token))
            .json(&serde_json::json!({ "name": "alice" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get("/api/names").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({
            "alice": { "count": 0, "lastClickedAt": null }
        }));
    }

    // Test 4: Mutations require a session
    #[tokio::test]
    async fn test_mutations_require_auth() {
        let server = create_test_server().await;

        server
            .post("/api/add")
            .json(&serde_json::json!({ "name": "alice" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/config")
            .json(&serde_json::json!({ "valuePerClick": 2 }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/increment/alice")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/reset")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .delete("/api/delete/alice")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Test 5: Counter lifecycle with a session
    #[tokio::test]
    async fn test_counter_lifecycle() {
        let server = create_test_server().await;
        let token = register_and_login(&server, "bilal", "pw1").await;

        server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "name": "alice" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "name": "alice" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&serde_json::json!({ "error": "Name already exists" }));

        server
            .post("/api/increment/alice")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();

        let names: serde_json::Value = server.get("/api/names").await.json();
        assert_eq!(names["alice"]["count"], 1);
        assert!(names["alice"]["lastClickedAt"].is_string());

        server
            .post("/api/increment/bob")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .delete("/api/delete/alice")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();

        server
            .delete("/api/delete/alice")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    // Test 6: Config update and reset keep each other's state
    #[tokio::test]
    async fn test_config_and_reset() {
        let server = create_test_server().await;
        let token = register_and_login(&server, "bilal", "pw1").await;

        let response = server
            .post("/api/config")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "valuePerClick": 1.5 }))
            .await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "message": "Value saved" }));

        server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "name": "alice" }))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/increment/alice")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();

        server
            .post("/api/reset")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();

        server
            .get("/api/names")
            .await
            .assert_json(&serde_json::json!({
                "alice": { "count": 0, "lastClickedAt": null }
            }));
        server
            .get("/api/config")
            .await
            .assert_json(&serde_json::json!({ "valuePerClick": 1.5 }));
    }

    // Test 7: Reserved and empty names are rejected
    #[tokio::test]
    async fn test_rejected_names() {
        let server = create_test_server().await;
        let token = register_and_login(&server, "bilal", "pw1").await;

        server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "name": "valuePerClick" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "name": "" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/api/increment/valuePerClick")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    // Test 8: Logout invalidates the session and is idempotent
    #[tokio::test]
    async fn test_logout() {
        let server = create_test_server().await;
        let token = register_and_login(&server, "bilal", "pw1").await;

        for _ in 0..2 {
            let response = server
                .post("/api/logout")
                .add_header(header::AUTHORIZATION, HeaderValue::from_str(&token).unwrap())
                .await;
            response.assert_status_ok();
            response.assert_json(&serde_json::json!({ "message": "Logged out" }));
        }

        server.post("/api/logout").await.assert_status_ok();

        server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "name": "alice" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Test 9: Storage failures become a generic 500
    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let mut mock_db = MockDatabase::new();
        mock_db
            .expect_list_counters()
            .returning(|| Err(DbError::Connection("disk I/O error".into())));

        let server = TestServer::new(build_router(state_for(mock_db))).unwrap();

        let response = server.get("/api/names").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&serde_json::json!({ "error": "Internal server error" }));
    }

    // Test 10: Unknown routes are 404
    #[tokio::test]
    async fn test_unknown_route() {
        let server = create_test_server().await;

        server
            .get("/api/unknown")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    // Test 11: Malformed request bodies get a JSON error and 400
    #[tokio::test]
    async fn test_malformed_bodies() {
        let server = create_test_server().await;
        let token = register_and_login(&server, "bilal", "pw1").await;

        let response = server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "name": 5 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("invalid type"));

        let response = server
            .post("/api/add")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());

        let response = server
            .post("/api/register")
            .json(&serde_json::json!({ "username": "x" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("password"));

        let response = server
            .post("/api/config")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({ "valuePerClick": "lots" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());

        let response = server.post("/api/login").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());

        // Nothing was added by the rejected requests
        server
            .get("/api/names")
            .await
            .assert_json(&serde_json::json!({}));
    }
}
