//! Token lifecycle: issuance, verification, revocation.
//!
//! Access tokens are verified purely from their signature and expiry, with
//! no store lookup beyond resolving the subject account. Refresh tokens are
//! verified against the store first: the row is the source of truth for
//! revocation and expiry, the signature only proves integrity. Every
//! verification failure collapses to `None`; callers never learn which
//! check failed.

use std::sync::Arc;

use tracing::error;

use crate::db::{Account, Database};
use crate::jwt::{AccessTokenResult, JwtConfig, JwtError, unix_now};

/// How many times issuance retries after a token-string UNIQUE collision.
const ISSUE_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct TokenService {
    jwt: Arc<JwtConfig>,
    db: Database,
}

/// Failure while issuing a refresh token. Store failures are fatal to the
/// request and must never be reported as a credential problem.
#[derive(Debug)]
pub enum IssueError {
    Jwt(JwtError),
    Store(sqlx::Error),
}

impl std::fmt::Display for IssueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueError::Jwt(e) => write!(f, "Failed to encode refresh token: {}", e),
            IssueError::Store(e) => write!(f, "Failed to persist refresh token: {}", e),
        }
    }
}

impl std::error::Error for IssueError {}

impl TokenService {
    pub fn new(jwt: Arc<JwtConfig>, db: Database) -> Self {
        Self { jwt, db }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Mint a signed access token for the account. Pure: no store writes.
    pub fn issue_access_token(&self, account: &Account) -> Result<AccessTokenResult, JwtError> {
        self.jwt.encode_access(&account.uuid, &account.username)
    }

    /// Mint a signed refresh token and persist its store row.
    ///
    /// Claims are second-granularity, so two issuances for one account in
    /// the same second sign to the same string and trip the UNIQUE
    /// constraint. A bounded retry regenerates; if the string still
    /// collides, the already-persisted identical row covers the new token
    /// and it is returned as-is.
    pub async fn issue_refresh_token(&self, account: &Account) -> Result<String, IssueError> {
        let mut attempt = 0;
        loop {
            let result = self.jwt.encode_refresh(&account.uuid).map_err(IssueError::Jwt)?;

            match self
                .db
                .tokens()
                .create(account.id, &result.token, result.issued_at, result.expires_at)
                .await
            {
                Ok(_) => return Ok(result.token),
                Err(e) if is_unique_violation(&e) && attempt < ISSUE_RETRIES => {
                    match self.db.tokens().get_by_token(&result.token).await {
                        Ok(Some(existing))
                            if !existing.is_blacklisted
                                && existing.account_id == account.id =>
                        {
                            // Same account, same second: the persisted row
                            // already backs this exact token string.
                            return Ok(result.token);
                        }
                        _ => attempt += 1,
                    }
                }
                Err(e) => return Err(IssueError::Store(e)),
            }
        }
    }

    /// Verify an access token and resolve its account.
    ///
    /// Fails closed: malformed token, bad signature, expiry, wrong token
    /// type, and unknown or inactive account all return `None`.
    pub async fn verify_access_token(&self, token: &str) -> Option<Account> {
        let claims = self.jwt.decode_access(token).ok()?;

        match self.db.accounts().get_active_by_uuid(&claims.user_id).await {
            Ok(account) => account,
            Err(e) => {
                error!(error = %e, "Account lookup failed during access token verification");
                None
            }
        }
    }

    /// Verify a refresh token and resolve its account.
    ///
    /// Conjunctive checks, ordered for short-circuiting: store row exists
    /// and is not blacklisted, store-recorded expiry is in the future
    /// (authoritative, independent of the signature expiry), signature and
    /// token type check out, and the account is active.
    pub async fn verify_refresh_token(&self, token: &str) -> Option<Account> {
        let record = match self.db.tokens().get_by_token(token).await {
            Ok(record) => record?,
            Err(e) => {
                error!(error = %e, "Token lookup failed during refresh token verification");
                return None;
            }
        };

        if record.is_blacklisted {
            return None;
        }

        let now = unix_now().ok()?;
        if now >= record.expires_at as u64 {
            return None;
        }

        let claims = self.jwt.decode_refresh(token).ok()?;

        match self.db.accounts().get_active_by_uuid(&claims.user_id).await {
            Ok(account) => account,
            Err(e) => {
                error!(error = %e, "Account lookup failed during refresh token verification");
                None
            }
        }
    }

    /// Blacklist a refresh token. Returns whether a row matched; repeated
    /// revocations of the same token keep returning true.
    pub async fn revoke_token(&self, token: &str) -> Result<bool, sqlx::Error> {
        self.db.tokens().blacklist(token).await
    }

    /// Blacklist every live refresh token owned by the account. Used for
    /// "logout everywhere" after a password change.
    pub async fn revoke_all_tokens(&self, account_id: i64) -> Result<u64, sqlx::Error> {
        self.db.tokens().blacklist_all_for_account(account_id).await
    }
}

/// Detect a SQLite UNIQUE constraint violation.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
