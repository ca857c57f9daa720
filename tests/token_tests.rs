//! Authentication gate and token lifecycle tests.
//!
//! Covers the cookie-driven request flow: access-token authentication,
//! the refresh fallback with silent access-token rotation, revocation on
//! logout, and redirect-to-login for unauthenticated protected requests.

mod common;

use axum::http::StatusCode;
use common::{
    TEST_PASSWORD, TEST_SECRET, body_json, create_test_app, extract_cookie, login,
    register_account, send_get, send_json, test_jwt,
};
use gatehouse::jwt::{AccessClaims, TokenType, unix_now};
use serde_json::json;

/// An access token for the account that expired a minute ago, signed with
/// the test secret.
fn expired_access_token(uuid: &str, username: &str) -> String {
    let now = unix_now().unwrap();
    let claims = AccessClaims {
        user_id: uuid.to_string(),
        username: username.to_string(),
        token_type: TokenType::Access,
        iat: now - 3600,
        exp: now - 60,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET),
    )
    .unwrap()
}

#[tokio::test]
async fn test_protected_path_redirects_without_tokens() {
    let (app, _db) = create_test_app().await;

    let response = send_get(&app, "/dashboard", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()["location"], "/login");
}

#[tokio::test]
async fn test_valid_access_token_authenticates_without_rotation() {
    let (app, _db) = create_test_app().await;
    register_account(&app, "alice").await;
    let (access, _refresh) = login(&app, "alice", TEST_PASSWORD).await;

    let response = send_get(
        &app,
        "/dashboard",
        Some(&format!("access_token={}", access)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Fresh access token: nothing to rotate
    assert!(extract_cookie(&response, "access_token").is_none());

    let body = body_json(response).await;
    assert_eq!(body["account"]["username"], "alice");
}

#[tokio::test]
async fn test_expired_access_with_valid_refresh_rotates() {
    let (app, db) = create_test_app().await;
    register_account(&app, "alice").await;
    let (_access, refresh) = login(&app, "alice", TEST_PASSWORD).await;

    let account = db.accounts().get_by_username("alice").await.unwrap().unwrap();
    let expired = expired_access_token(&account.uuid, "alice");

    let response = send_get(
        &app,
        "/dashboard",
        Some(&format!("access_token={}; refresh_token={}", expired, refresh)),
    )
    .await;

    // Authenticated via the refresh fallback, and a fresh access cookie
    // rides on the response
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = extract_cookie(&response, "access_token").expect("rotated access cookie");

    let claims = test_jwt().decode_access(&rotated).unwrap();
    assert_eq!(claims.user_id, account.uuid);
    assert_eq!(claims.username, "alice");
}

#[tokio::test]
async fn test_refresh_cookie_alone_authenticates() {
    let (app, _db) = create_test_app().await;
    register_account(&app, "alice").await;
    let (_access, refresh) = login(&app, "alice", TEST_PASSWORD).await;

    let response = send_get(
        &app,
        "/profile",
        Some(&format!("refresh_token={}", refresh)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(extract_cookie(&response, "access_token").is_some());
}

#[tokio::test]
async fn test_refresh_token_in_access_slot_is_rejected() {
    let (app, _db) = create_test_app().await;
    register_account(&app, "alice").await;
    let (_access, refresh) = login(&app, "alice", TEST_PASSWORD).await;

    // A refresh token cannot impersonate an access token
    let response = send_get(
        &app,
        "/dashboard",
        Some(&format!("access_token={}", refresh)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_logout_revokes_and_clears() {
    let (app, db) = create_test_app().await;
    register_account(&app, "alice").await;
    let (access, refresh) = login(&app, "alice", TEST_PASSWORD).await;

    let response = send_json(
        &app,
        "POST",
        "/logout",
        json!({}),
        Some(&format!("access_token={}; refresh_token={}", access, refresh)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Both cookies cleared
    assert_eq!(extract_cookie(&response, "access_token").as_deref(), Some(""));
    assert_eq!(extract_cookie(&response, "refresh_token").as_deref(), Some(""));

    // The store row is blacklisted, not deleted
    let record = db.tokens().get_by_token(&refresh).await.unwrap().unwrap();
    assert!(record.is_blacklisted);

    // The revoked refresh token no longer authenticates
    let response = send_get(
        &app,
        "/dashboard",
        Some(&format!("refresh_token={}", refresh)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let (app, _db) = create_test_app().await;
    register_account(&app, "alice").await;
    let (access, refresh) = login(&app, "alice", TEST_PASSWORD).await;
    let cookies = format!("access_token={}; refresh_token={}", access, refresh);

    let response = send_json(&app, "POST", "/logout", json!({}), Some(&cookies)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Second logout with the same (now revoked) refresh token still 200s.
    // The access token is stateless and still valid, so the gate lets the
    // request through.
    let response = send_json(&app, "POST", "/logout", json!({}), Some(&cookies)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_home_reports_identity_without_requiring_it() {
    let (app, _db) = create_test_app().await;

    // Anonymous: public, no redirect
    let response = send_get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["username"], serde_json::Value::Null);

    // With a valid access token the identity slot is filled
    register_account(&app, "alice").await;
    let (access, _refresh) = login(&app, "alice", TEST_PASSWORD).await;
    let response = send_get(&app, "/", Some(&format!("access_token={}", access))).await;
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_public_paths_never_rotate() {
    let (app, db) = create_test_app().await;
    register_account(&app, "alice").await;
    let (_access, refresh) = login(&app, "alice", TEST_PASSWORD).await;

    let account = db.accounts().get_by_username("alice").await.unwrap().unwrap();
    let expired = expired_access_token(&account.uuid, "alice");

    // On a public path the refresh fallback is skipped entirely
    let response = send_get(
        &app,
        "/",
        Some(&format!("access_token={}; refresh_token={}", expired, refresh)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(extract_cookie(&response, "access_token").is_none());
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_disabled_account_fails_even_with_valid_cookies() {
    let (app, db) = create_test_app().await;
    register_account(&app, "alice").await;
    let (access, refresh) = login(&app, "alice", TEST_PASSWORD).await;

    let account = db.accounts().get_by_username("alice").await.unwrap().unwrap();
    db.accounts().set_active(account.id, false).await.unwrap();

    // Both tokens are cryptographically valid; the account filter rejects
    let response = send_get(
        &app,
        "/dashboard",
        Some(&format!("access_token={}; refresh_token={}", access, refresh)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_healthz_is_public() {
    let (app, _db) = create_test_app().await;
    let response = send_get(&app, "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
