//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use click_ledger::auth::{AuthConfig, AuthManager, RateLimitConfig};
use click_ledger::config::ServerConfig;
use click_ledger::database::{Database, SqliteDatabase};
use click_ledger::ledger::Ledger;
use click_ledger::models::{LoginResponse, DEFAULT_VALUE_PER_CLICK};
use click_ledger::server::{AppState, Server};

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::new(":memory:")
            .await
            .expect("Failed to create test database"),
    )
}

/// Create a test authentication manager with the given settings
pub fn create_test_auth_manager<D: Database>(
    db: Arc<D>,
    config: AuthConfig,
) -> Arc<AuthManager<D>> {
    Arc::new(AuthManager::new(db, config))
}

/// Authentication settings with a tight failed-login limit
pub fn strict_auth_config(max_failures: u32) -> AuthConfig {
    AuthConfig {
        session_ttl: None,
        rate_limit: RateLimitConfig {
            max_failures,
            block_duration: std::time::Duration::from_secs(60),
            window_duration: std::time::Duration::from_secs(120),
        },
    }
}

/// Create an application state over an existing database
pub fn create_state_with<D: Database>(database: Arc<D>, auth_config: AuthConfig) -> AppState<D> {
    let auth_manager = create_test_auth_manager(Arc::clone(&database), auth_config);
    let ledger = Arc::new(Ledger::new(database, DEFAULT_VALUE_PER_CLICK));

    AppState {
        auth_manager,
        ledger,
    }
}

/// Create a test application state backed by an in-memory database
pub async fn create_test_state() -> AppState<SqliteDatabase> {
    create_state_with(create_test_database().await, AuthConfig::default())
}

/// Create a test server configuration with a random port
pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0, // Let OS assign a free port
        ..Default::default()
    }
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server<D: Database + 'static>(
    state: AppState<D>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let server = Server::new(create_test_server_config(), state);

    tokio::spawn(async move {
        server
            .run_with_listener(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    // Give the server a moment to start (100ms is sufficient for slow CI systems)
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}

/// Register a user over HTTP and return the login session token
pub async fn register_and_login(
    client: &reqwest::Client,
    addr: SocketAddr,
    username: &str,
    password: &str,
) -> String {
    let credentials = serde_json::json!({ "username": username, "password": password });

    let response = client
        .post(format!("http://{}/api/register", addr))
        .json(&credentials)
        .send()
        .await
        .expect("register request failed");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let response = client
        .post(format!("http://{}/api/login", addr))
        .json(&credentials)
        .send()
        .await
        .expect("login request failed");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    response
        .json::<LoginResponse>()
        .await
        .expect("login response body")
        .token
}
