//! Account endpoints: registration and password change.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::Deserialize;
use tracing::{error, info};

use super::error::{ApiError, ResultExt};
use crate::AppState;
use crate::auth::{ACCESS_COOKIE_NAME, CurrentAccount, REFRESH_COOKIE_NAME, clear_cookie};
use crate::db::NewAccount;
use crate::password::{hash_password, verify_password};

/// Registration form. Every field is defaulted so that missing ones fall
/// through to the required-field messages instead of a deserialize error.
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub salutation: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

/// Create a new account.
///
/// Collects every violation (duplicates, password mismatch, policy
/// failures, missing fields) before answering, so the caller can display
/// the complete set at once.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim().to_lowercase();
    let phone = match payload.phone.trim() {
        "" => None,
        p => Some(p),
    };

    let mut errors = Vec::new();

    if !username.is_empty()
        && state
            .db
            .accounts()
            .username_exists(&username)
            .await
            .db_err("Failed to check username")?
    {
        errors.push("An account with this username already exists.".to_string());
    }

    if let Some(phone) = phone {
        if !is_valid_phone(phone) {
            errors.push(
                "Phone number must be entered in the format: '+999999999'. \
                 Up to 15 digits allowed."
                    .to_string(),
            );
        } else if state
            .db
            .accounts()
            .phone_exists(phone)
            .await
            .db_err("Failed to check phone number")?
        {
            errors.push("An account with this phone number already exists.".to_string());
        }
    }

    if payload.password != payload.password_confirm {
        errors.push("Passwords do not match.".to_string());
    }

    errors.extend(state.password_policy.validate(&payload.password));

    let required = [
        ("Full Name", payload.full_name.trim()),
        ("Dob", payload.dob.trim()),
        ("Gender", payload.gender.trim()),
        ("Username", username.as_str()),
        ("Address", payload.address.trim()),
        ("Location", payload.location.trim()),
    ];
    for (label, value) in required {
        if value.is_empty() {
            errors.push(format!("{} is required.", label));
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create account")
    })?;

    let salutation = match payload.salutation.trim() {
        "" => "Mr",
        s => s,
    };
    let uuid = uuid::Uuid::new_v4().to_string();

    state
        .db
        .accounts()
        .create(&NewAccount {
            uuid: &uuid,
            username: &username,
            password_hash: &password_hash,
            salutation,
            full_name: payload.full_name.trim(),
            dob: payload.dob.trim(),
            gender: payload.gender.trim(),
            phone,
            address: payload.address.trim(),
            location: payload.location.trim(),
        })
        .await
        .db_err("Failed to create account")?;

    info!(username = %username, "Account created");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Account created successfully! Please login.",
            "uuid": uuid,
        })),
    ))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_confirm: String,
}

/// Change the password of the authenticated account, then log out
/// everywhere: every refresh token is blacklisted and the cookie pair is
/// cleared, forcing a fresh login.
pub async fn change_password(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = Vec::new();

    if !verify_password(&payload.old_password, &account.password_hash) {
        errors.push("Current password is incorrect.".to_string());
    }

    if payload.new_password != payload.new_password_confirm {
        errors.push("New passwords do not match.".to_string());
    }

    errors.extend(state.password_policy.validate(&payload.new_password));

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let password_hash = hash_password(&payload.new_password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to change password")
    })?;

    state
        .db
        .accounts()
        .update_password(account.id, &password_hash)
        .await
        .db_err("Failed to update password")?;

    let revoked = state
        .tokens
        .revoke_all_tokens(account.id)
        .await
        .db_err("Failed to revoke tokens")?;

    info!(username = %account.username, revoked, "Password changed");

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies)),
            (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies)),
        ]),
        Json(serde_json::json!({
            "message": "Password changed successfully. Please login again."
        })),
    ))
}

/// Phone numbers: optional leading '+', 9 to 15 digits.
fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (9..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}
