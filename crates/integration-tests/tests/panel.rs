//! Integration tests for sign-in, the dashboard and health checks.

#![allow(clippy::unwrap_used)]

use axum::http::{StatusCode, header};

use woo_porter_integration_tests::{
    TEST_ADMIN_KEY, TEST_VIEWER_KEY, TestApp, body_text, header_str,
};

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let response = app.get("/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reflects_database() {
    let app = TestApp::new();
    assert_eq!(app.get("/health/ready", None).await.status(), StatusCode::OK);

    app.store.set_failing(true);

    assert_eq!(
        app.get("/health/ready", None).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_wrong_access_key_is_rejected() {
    let app = TestApp::new();

    let response = app
        .post_form("/auth/login", None, &[("access_key", "guess")])
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Invalid access key"));
}

#[tokio::test]
async fn test_dashboard_requires_login() {
    let app = TestApp::new();

    let response = app.get("/", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_str(&response, header::LOCATION), "/auth/login");
}

#[tokio::test]
async fn test_admin_dashboard_lists_exports() {
    let app = TestApp::new();
    let session = app.login(TEST_ADMIN_KEY).await;

    let html = body_text(app.get("/", Some(&session)).await).await;

    for path in [
        "/exports/product-images",
        "/exports/unused-images",
        "/exports/pdfs",
        "/exports/customers",
        "/exports/customers/batched",
    ] {
        assert!(html.contains(path), "missing {path}");
    }
}

#[tokio::test]
async fn test_viewer_dashboard_has_no_exports() {
    let app = TestApp::new();
    let session = app.login(TEST_VIEWER_KEY).await;

    let response = app.get("/", Some(&session)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_text(response).await.contains("/exports/"));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let session = app.login(TEST_ADMIN_KEY).await;

    let response = app.post_form("/auth/logout", Some(&session), &[]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let after = app.get("/", Some(&session)).await;
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
}
