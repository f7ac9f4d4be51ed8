mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use serde_json::json;

async fn register(app: &TestApp, email: &str, password: &str) -> axum::http::Response<axum::body::Body> {
    app.request(
        Method::POST,
        "/api/v1/auth/register",
        Some(json!({ "name": "Dana", "email": email, "password": password })),
        None,
    )
    .await
}

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new().await;

    let response = register(&app, "Dana@Example.com", "correct-horse").await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(body["data"]["user"]["email"], "dana@example.com");
    assert_eq!(body["data"]["user"]["role"], "user");
    assert!(body["data"]["user"].get("password_hash").is_none());
    assert_eq!(body["data"]["token_type"], "Bearer");

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "dana@example.com", "password": "correct-horse" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let token = response_json(response).await["data"]["access_token"]
        .as_str()
        .expect("token")
        .to_string();

    let me = app.request(Method::GET, "/api/v1/me", None, Some(&token)).await;
    assert_eq!(me.status(), 200);
    assert_eq!(response_json(me).await["data"]["name"], "Dana");
}

#[tokio::test]
async fn duplicate_email_conflicts_regardless_of_case() {
    let app = TestApp::new().await;
    assert_eq!(register(&app, "dana@example.com", "correct-horse").await.status(), 201);

    let response = register(&app, "DANA@example.com", "another-pass").await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let app = TestApp::new().await;
    let response = register(&app, "dana@example.com", "short").await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn login_failures_are_distinguished() {
    let app = TestApp::new().await;
    register(&app, "dana@example.com", "correct-horse").await;

    let wrong = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "dana@example.com", "password": "battery-staple" })),
            None,
        )
        .await;
    assert_eq!(wrong.status(), 401);

    let unknown = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "nobody@example.com", "password": "correct-horse" })),
            None,
        )
        .await;
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn deactivated_account_cannot_log_in() {
    let app = TestApp::new().await;
    let body = response_json(register(&app, "dana@example.com", "correct-horse").await).await;
    let user_id = body["data"]["user"]["id"].as_str().expect("id").to_string();

    let (_, admin_token) = app.admin().await;
    let toggled = app
        .request(
            Method::PATCH,
            &format!("/api/v1/admin/users/{user_id}/toggle-active"),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(toggled.status(), 200);
    assert_eq!(response_json(toggled).await["data"]["active"], false);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "dana@example.com", "password": "correct-horse" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn email_availability() {
    let app = TestApp::new().await;
    let (user, token) = app.customer().await;

    let taken = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/me/check-email?email={}", user.email),
            None,
            Some(&token),
        )
        .await,
    )
    .await;
    assert_eq!(taken["data"]["available"], false);

    let free = response_json(
        app.request(
            Method::GET,
            "/api/v1/me/check-email?email=fresh@example.com",
            None,
            Some(&token),
        )
        .await,
    )
    .await;
    assert_eq!(free["data"]["available"], true);
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/me", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), 401);
}
