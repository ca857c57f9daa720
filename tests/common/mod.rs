#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use gatehouse::db::Database;
use gatehouse::jwt::JwtConfig;
use gatehouse::{ServerConfig, create_app};
use serde_json::json;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-for-testing-only";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Create a test app over an in-memory database.
pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig::new(db.clone(), TEST_SECRET.to_vec());
    (create_app(&config), db)
}

/// A JwtConfig matching the test app's secret, for crafting and decoding
/// tokens out-of-band.
pub fn test_jwt() -> JwtConfig {
    JwtConfig::new(TEST_SECRET)
}

/// Send a JSON request, optionally with a Cookie header.
pub async fn send_json(
    app: &Router,
    method: &str,
    path: &str,
    body: serde_json::Value,
    cookies: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    let request = builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .expect("Failed to build request");

    app.clone().oneshot(request).await.expect("Request failed")
}

/// Send a bodyless GET, optionally with a Cookie header.
pub async fn send_get(app: &Router, path: &str, cookies: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    let request = builder.body(Body::empty()).expect("Failed to build request");

    app.clone().oneshot(request).await.expect("Request failed")
}

/// Read the response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Extract a cookie value from the Set-Cookie headers of a response.
pub fn extract_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    for value in response.headers().get_all(header::SET_COOKIE) {
        let value = value.to_str().ok()?;
        if let Some(rest) = value.strip_prefix(&prefix) {
            return Some(rest.split(';').next().unwrap_or("").to_string());
        }
    }
    None
}

/// A complete, valid registration payload for the given username.
pub fn register_payload(username: &str) -> serde_json::Value {
    json!({
        "salutation": "Miss",
        "full_name": "Alice Example",
        "dob": "1990-01-01",
        "gender": "F",
        "username": username,
        "phone": "",
        "address": "1 Example Road",
        "location": "Exampleton",
        "password": TEST_PASSWORD,
        "password_confirm": TEST_PASSWORD,
    })
}

/// Register an account through the endpoint, asserting success.
pub async fn register_account(app: &Router, username: &str) {
    let response = send_json(app, "POST", "/register", register_payload(username), None).await;
    assert_eq!(
        response.status(),
        axum::http::StatusCode::CREATED,
        "registration should succeed"
    );
}

/// Log in and return the (access, refresh) cookie values.
pub async fn login(app: &Router, username: &str, password: &str) -> (String, String) {
    let response = send_json(
        app,
        "POST",
        "/login",
        json!({ "username": username, "password": password }),
        None,
    )
    .await;
    assert_eq!(
        response.status(),
        axum::http::StatusCode::OK,
        "login should succeed"
    );

    let access = extract_cookie(&response, "access_token").expect("access cookie");
    let refresh = extract_cookie(&response, "refresh_token").expect("refresh cookie");
    (access, refresh)
}
