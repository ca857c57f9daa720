//! Session lifecycle endpoints: login, logout, and the authenticated
//! JSON views standing in for the rendered pages.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::error::{ApiError, ResultExt};
use crate::AppState;
use crate::auth::{
    ACCESS_COOKIE_NAME, AuthContext, CurrentAccount, REFRESH_COOKIE_NAME, clear_cookie,
    get_cookie, set_cookie,
};
use crate::db::Account;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    message: String,
    account: AccountSummary,
}

/// Account fields safe to return to the client. The password hash and the
/// internal row ID stay server-side.
#[derive(Serialize)]
struct AccountSummary {
    uuid: String,
    username: String,
    salutation: String,
    full_name: String,
    dob: String,
    gender: String,
    phone: Option<String>,
    address: String,
    location: String,
    last_login: Option<String>,
}

impl From<Account> for AccountSummary {
    fn from(account: Account) -> Self {
        Self {
            uuid: account.uuid,
            username: account.username,
            salutation: account.salutation,
            full_name: account.full_name,
            dob: account.dob,
            gender: account.gender,
            phone: account.phone,
            address: account.address,
            location: account.location,
            last_login: account.last_login,
        }
    }
}

/// The public login entry point, target of the gate's redirect. The
/// rendering layer owns the real form; this mirrors its behavior of
/// sending already-authenticated visitors on to the dashboard.
pub async fn login_page(Extension(ctx): Extension<AuthContext>) -> Response {
    if ctx.authenticated {
        return Redirect::temporary("/dashboard").into_response();
    }
    Json(serde_json::json!({ "message": "Please log in." })).into_response()
}

/// Authenticate credentials and set the token cookie pair.
///
/// An unknown username and a wrong password produce the identical
/// response, so callers cannot probe which usernames exist. A deactivated
/// account is reported distinctly once the username matched.
pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    // Already authenticated (the gate filled the identity slot): go to
    // the dashboard instead of re-issuing tokens.
    if ctx.authenticated {
        return Ok(Redirect::temporary("/dashboard").into_response());
    }

    let username = payload.username.trim().to_lowercase();

    let account = state
        .db
        .accounts()
        .get_by_username(&username)
        .await
        .db_err("Failed to look up account")?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password."))?;

    if !account.is_active {
        return Err(ApiError::forbidden("Your account has been deactivated."));
    }

    if !crate::password::verify_password(&payload.password, &account.password_hash) {
        return Err(ApiError::unauthorized("Invalid username or password."));
    }

    // Issuance failures are infrastructure problems and must surface as
    // such, never as a credential error.
    let access = state.tokens.issue_access_token(&account).map_err(|e| {
        error!(error = %e, "Failed to issue access token");
        ApiError::internal("Failed to issue tokens")
    })?;
    let refresh = state.tokens.issue_refresh_token(&account).await.map_err(|e| {
        error!(error = %e, "Failed to issue refresh token");
        ApiError::internal("Failed to issue tokens")
    })?;

    if let Err(e) = state.db.accounts().update_last_login(account.id).await {
        warn!(error = %e, "Failed to update last login");
    }

    info!(username = %account.username, "Login succeeded");

    let message = format!("Welcome back, {}!", account.full_name);
    let cookies = AppendHeaders([
        (
            SET_COOKIE,
            set_cookie(
                ACCESS_COOKIE_NAME,
                &access.token,
                access.ttl,
                state.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            set_cookie(
                REFRESH_COOKIE_NAME,
                &refresh,
                state.tokens.jwt().refresh_ttl(),
                state.secure_cookies,
            ),
        ),
    ]);

    Ok((
        StatusCode::OK,
        cookies,
        Json(LoginResponse {
            message,
            account: AccountSummary::from(account),
        }),
    )
        .into_response())
}

/// Revoke the refresh token and clear both cookies.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(refresh_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        let revoked = state
            .tokens
            .revoke_token(refresh_token)
            .await
            .db_err("Failed to revoke refresh token")?;
        if !revoked {
            // Cookie points at a token the store never saw; nothing to do
            warn!("Logout with unknown refresh token");
        }
    }

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies)),
            (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies)),
        ]),
        Json(serde_json::json!({
            "message": "You have been logged out successfully."
        })),
    ))
}

/// The authenticated landing view.
pub async fn dashboard(CurrentAccount(account): CurrentAccount) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": format!("Welcome back, {}!", account.full_name),
        "account": AccountSummary::from(account),
    }))
}

/// The authenticated profile view.
pub async fn profile(CurrentAccount(account): CurrentAccount) -> impl IntoResponse {
    Json(AccountSummary::from(account))
}

#[derive(Serialize)]
struct HomeResponse {
    authenticated: bool,
    username: Option<String>,
}

/// Public home. Reports the identity slot when a valid access token came
/// along for the ride.
pub async fn home(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    Json(HomeResponse {
        authenticated: ctx.authenticated,
        username: ctx.account.map(|a| a.username),
    })
}

/// Liveness probe.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
