//! JWT encoding and decoding for the dual-token scheme.
//!
//! Access tokens are short-lived and stateless; refresh tokens are
//! long-lived and backed by a database row (see `crate::db::token`).
//! Both are HS256-signed with a shared secret and validated with zero
//! leeway.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default access token lifetime: 1 hour.
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 3600;

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Token type claim, rejected on mismatch so an access token can never
/// stand in for a refresh token or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account UUID (subject)
    pub user_id: String,
    /// Username at issue time
    pub username: String,
    pub token_type: TokenType,
    /// Issued at (unix seconds)
    pub iat: u64,
    /// Expiration (unix seconds)
    pub exp: u64,
}

/// Claims carried by a refresh token. No username: the account is
/// re-resolved from the store on every use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Account UUID (subject)
    pub user_id: String,
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// A freshly encoded access token with its cookie lifetime.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    pub token: String,
    /// Lifetime in seconds, for the cookie Max-Age
    pub ttl: u64,
}

/// A freshly encoded refresh token with the timestamps the store row needs.
#[derive(Debug, Clone)]
pub struct RefreshTokenResult {
    pub token: String,
    pub issued_at: u64,
    pub expires_at: u64,
    pub ttl: u64,
}

/// Signing configuration. Explicitly constructed and passed down so tests
/// can run with distinct secrets and lifetimes.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: u64,
    refresh_ttl: u64,
}

impl JwtConfig {
    /// Create a configuration with the given secret and default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl: DEFAULT_REFRESH_TTL_SECS,
        }
    }

    /// Override the token lifetimes (seconds).
    pub fn with_ttls(mut self, access_ttl: u64, refresh_ttl: u64) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn access_ttl(&self) -> u64 {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> u64 {
        self.refresh_ttl
    }

    /// Encode an access token for the given account.
    pub fn encode_access(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<AccessTokenResult, JwtError> {
        let now = unix_now()?;
        let claims = AccessClaims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            token_type: TokenType::Access,
            iat: now,
            exp: now + self.access_ttl,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(AccessTokenResult {
            token,
            ttl: self.access_ttl,
        })
    }

    /// Encode a refresh token for the given account. The caller persists
    /// the returned timestamps alongside the token string.
    pub fn encode_refresh(&self, user_id: &str) -> Result<RefreshTokenResult, JwtError> {
        let now = unix_now()?;
        let exp = now + self.refresh_ttl;
        let claims = RefreshClaims {
            user_id: user_id.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(RefreshTokenResult {
            token,
            issued_at: now,
            expires_at: exp,
            ttl: self.refresh_ttl,
        })
    }

    /// Validate signature and expiry, then the token type.
    pub fn decode_access(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let token_data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &self.validation())
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Validate signature and expiry, then the token type.
    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let token_data =
            jsonwebtoken::decode::<RefreshClaims>(token, &self.decoding_key, &self.validation())
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation
    }
}

/// Current unix time in seconds, read once per operation.
pub fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors from JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (bad signature, malformed, expired)
    Decoding(jsonwebtoken::errors::Error),
    /// System clock before the unix epoch
    TimeError,
    /// Valid signature but wrong token_type claim
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
