//! The per-request authentication decision.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::error;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie, set_cookie};
use crate::AppState;
use crate::db::Account;

/// Paths exempt from authentication, matched by prefix. The bare root is
/// matched exactly so "/" does not make every path public.
#[derive(Debug, Clone)]
pub struct PublicPaths {
    prefixes: Vec<String>,
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self {
            prefixes: vec![
                "/login".to_string(),
                "/register".to_string(),
                "/healthz".to_string(),
            ],
        }
    }
}

impl PublicPaths {
    /// Add an extra public prefix on top of the defaults.
    pub fn with_extra(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn is_public(&self, path: &str) -> bool {
        path == "/" || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// The authentication decision for one request, attached to the request
/// extensions by [`authenticate`] and consumed by handlers downstream.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub authenticated: bool,
    pub account: Option<Account>,
    /// Set when authentication fell back to the refresh token; the
    /// response path then issues a fresh access-token cookie.
    pub must_rotate_access_token: bool,
}

impl AuthContext {
    fn anonymous() -> Self {
        Self {
            authenticated: false,
            account: None,
            must_rotate_access_token: false,
        }
    }
}

/// Authentication gate middleware, run once per request before any handler.
///
/// Public paths skip enforcement; a valid access token still fills the
/// identity slot so public handlers (e.g. login) can see who is asking.
/// Protected paths try the access token, then fall back to the refresh
/// token (flagging rotation), and otherwise redirect to the login entry
/// point. Which check failed is never surfaced.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let public = state.public_paths.is_public(req.uri().path());

    let mut ctx = AuthContext::anonymous();

    if let Some(token) = get_cookie(req.headers(), ACCESS_COOKIE_NAME) {
        if let Some(account) = state.tokens.verify_access_token(token).await {
            ctx.authenticated = true;
            ctx.account = Some(account);
        }
    }

    if !public && !ctx.authenticated {
        if let Some(token) = get_cookie(req.headers(), REFRESH_COOKIE_NAME) {
            if let Some(account) = state.tokens.verify_refresh_token(token).await {
                ctx.authenticated = true;
                ctx.account = Some(account);
                ctx.must_rotate_access_token = true;
            }
        }
    }

    if !public && !ctx.authenticated {
        return Redirect::temporary(&state.login_path).into_response();
    }

    let rotate_for = ctx
        .must_rotate_access_token
        .then(|| ctx.account.clone())
        .flatten();

    req.extensions_mut().insert(ctx);
    let mut response = next.run(req).await;

    if let Some(account) = rotate_for {
        match state.tokens.issue_access_token(&account) {
            Ok(access) => {
                let cookie = set_cookie(
                    ACCESS_COOKIE_NAME,
                    &access.token,
                    access.ttl,
                    state.secure_cookies,
                );
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    response.headers_mut().append(SET_COOKIE, value);
                }
            }
            Err(e) => error!(error = %e, "Failed to rotate access token"),
        }
    }

    response
}

/// Extractor for handlers that require an authenticated account. Fails
/// closed with 401 if the gate did not authenticate the request (which for
/// protected paths means the gate layer is missing).
pub struct CurrentAccount(pub Account);

impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .and_then(|ctx| ctx.account.clone())
            .map(CurrentAccount)
            .ok_or(GateRejection)
    }
}

/// Rejection for [`CurrentAccount`]: a bare JSON 401.
#[derive(Debug)]
pub struct GateRejection;

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Not authenticated",
            }),
        )
            .into_response()
    }
}
