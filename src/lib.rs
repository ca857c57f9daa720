pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod tokens;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use auth::PublicPaths;
use db::Database;
use jwt::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS, JwtConfig};
use password::PasswordPolicy;
use tokens::TokenService;

pub struct ServerConfig {
    /// Database connection (cloneable, uses a connection pool internally)
    pub db: Database,
    /// JWT signing secret
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl: u64,
    /// Whether to set the Secure flag on cookies (true behind TLS)
    pub secure_cookies: bool,
    /// Paths exempt from authentication
    pub public_paths: PublicPaths,
    /// Where unauthenticated requests to protected paths are redirected
    pub login_path: String,
}

impl ServerConfig {
    /// Configuration with default lifetimes and allow-list.
    pub fn new(db: Database, jwt_secret: Vec<u8>) -> Self {
        Self {
            db,
            jwt_secret,
            access_ttl: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl: DEFAULT_REFRESH_TTL_SECS,
            secure_cookies: false,
            public_paths: PublicPaths::default(),
            login_path: "/login".to_string(),
        }
    }
}

/// Shared application state, cloned into every handler and the gate.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: TokenService,
    pub password_policy: Arc<PasswordPolicy>,
    pub public_paths: Arc<PublicPaths>,
    pub secure_cookies: bool,
    pub login_path: Arc<String>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(
        JwtConfig::new(&config.jwt_secret).with_ttls(config.access_ttl, config.refresh_ttl),
    );

    let state = AppState {
        db: config.db.clone(),
        tokens: TokenService::new(jwt, config.db.clone()),
        password_policy: Arc::new(PasswordPolicy::default()),
        public_paths: Arc::new(config.public_paths.clone()),
        secure_cookies: config.secure_cookies,
        login_path: Arc::new(config.login_path.clone()),
    };

    api::create_router(state)
}

/// Run the server on the given listener. Blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to
/// let the OS choose. Returns the actual address.
/// Note: for production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
