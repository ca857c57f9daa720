mod accounts;
mod error;
mod sessions;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::AppState;
use crate::auth::authenticate;

/// Build the route table with the authentication gate layered over every
/// route. Which paths the gate enforces is decided by the public
/// allow-list, not by the routing structure.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(sessions::home))
        .route("/healthz", get(sessions::healthz))
        .route("/login", get(sessions::login_page).post(sessions::login))
        .route("/register", post(accounts::register))
        .route("/logout", post(sessions::logout))
        .route("/dashboard", get(sessions::dashboard))
        .route("/profile", get(sessions::profile))
        .route("/change-password", post(accounts::change_password))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}
