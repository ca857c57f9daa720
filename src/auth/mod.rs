//! Request-time authentication gate.
//!
//! A middleware runs before every handler: it reads the token cookies,
//! asks the token service for a verdict, and attaches a typed
//! [`AuthContext`] to the request. Requests to non-public paths that fail
//! authentication are redirected to the login entry point before any
//! handler runs. When authentication succeeded via the refresh-token
//! fallback, the response path mints and sets a fresh access token.

mod cookie;
mod gate;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, set_cookie,
};
pub use gate::{AuthContext, CurrentAccount, GateRejection, PublicPaths, authenticate};
