//! Password hashing and strength policy.
//!
//! Hashes are salted Argon2id PHC strings; verification never leaks why a
//! candidate failed. The strength policy returns every violation at once so
//! registration can surface the complete list.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check a plaintext password against a stored PHC hash.
/// An unparsable hash counts as a failed match, not an error to surface.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug)]
pub enum PasswordError {
    Hash(String),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Hash(e) => write!(f, "Password hashing failed: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Minimum-strength rules applied at registration and password change.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub disallow_all_numeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            disallow_all_numeric: true,
        }
    }
}

impl PasswordPolicy {
    /// Validate a candidate password, returning every violation message.
    pub fn validate(&self, password: &str) -> Vec<String> {
        let mut violations = Vec::new();

        if password.chars().count() < self.min_length {
            violations.push(format!(
                "This password is too short. It must contain at least {} characters.",
                self.min_length
            ));
        }
        if password.chars().count() > self.max_length {
            violations.push(format!(
                "This password is too long. It must contain at most {} characters.",
                self.max_length
            ));
        }
        if self.disallow_all_numeric
            && !password.is_empty()
            && password.chars().all(|c| c.is_ascii_digit())
        {
            violations.push("This password is entirely numeric.".to_string());
        }

        violations
    }
}
