//! Refresh token storage for revocation tracking.
//!
//! Only refresh tokens are stored; access tokens are stateless. A row is
//! usable iff `is_blacklisted = 0` and the store-recorded expiry is in the
//! future. Revocation flips the flag and never deletes the row.

use sqlx::sqlite::SqlitePool;

/// A persisted refresh token row. Timestamps are unix seconds.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub account_id: i64,
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub is_blacklisted: bool,
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: i64,
    account_id: i64,
    token: String,
    issued_at: i64,
    expires_at: i64,
    is_blacklisted: i32,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            token: row.token,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            is_blacklisted: row.is_blacklisted != 0,
        }
    }
}

pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a refresh token row. Fails on a duplicate token string.
    pub async fn create(
        &self,
        account_id: i64,
        token: &str,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (account_id, token, issued_at, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(account_id)
        .bind(token)
        .bind(issued_at as i64)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Look up a token row by its exact token string.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            "SELECT id, account_id, token, issued_at, expires_at, is_blacklisted \
             FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshTokenRecord::from))
    }

    /// Blacklist a token (revoke). Returns whether a row matched.
    /// Idempotent: blacklisting an already-blacklisted token still
    /// reports the row as found.
    pub async fn blacklist(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE refresh_tokens SET is_blacklisted = 1 WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Blacklist every live token owned by an account ("logout everywhere").
    /// Returns the number of rows flipped.
    pub async fn blacklist_all_for_account(&self, account_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_blacklisted = 1 \
             WHERE account_id = ? AND is_blacklisted = 0",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// List all token rows for an account, newest first.
    pub async fn list_by_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<RefreshTokenRecord>, sqlx::Error> {
        let rows: Vec<RefreshTokenRow> = sqlx::query_as(
            "SELECT id, account_id, token, issued_at, expires_at, is_blacklisted \
             FROM refresh_tokens WHERE account_id = ? ORDER BY issued_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RefreshTokenRecord::from).collect())
    }
}
