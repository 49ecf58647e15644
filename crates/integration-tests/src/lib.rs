//! Integration tests for woo-porter.
//!
//! Tests drive the full admin router in-process: real routes, extractors and
//! session layer, with the WordPress database replaced by
//! [`InMemoryStore`] and sessions kept in a `tower_sessions::MemoryStore`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p woo-porter-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let app = TestApp::new();
//! let session = app.login(TEST_ADMIN_KEY).await;
//! let response = app.get("/", Some(&session)).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! ```

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use woo_porter_admin::{
    app,
    middleware::create_session_layer,
    routes::api::exports::TokenResponse,
    state::AppState,
    testing::{InMemoryStore, test_config},
};

pub use woo_porter_admin::testing::{
    TEST_ADMIN_KEY, TEST_UPLOADS_URL, TEST_VIEWER_KEY, named, order, registered,
};

/// Batch size used unless a test asks for another.
pub const DEFAULT_BATCH_SIZE: u32 = 500;

/// A signed-in browser: session cookie plus the anti-forgery token, if the
/// role is allowed to fetch one.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub cookie: String,
    pub csrf_token: Option<String>,
}

impl TestSession {
    /// The anti-forgery token; panics for roles that could not fetch one.
    #[must_use]
    pub fn token(&self) -> &str {
        self.csrf_token
            .as_deref()
            .expect("session has no CSRF token")
    }
}

/// The admin router over an in-memory store and a scratch uploads directory.
pub struct TestApp {
    router: Router,
    pub store: Arc<InMemoryStore>,
    pub uploads: TempDir,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    /// Build the app with a specific export page size.
    #[must_use]
    pub fn with_batch_size(batch_size: u32) -> Self {
        let uploads = tempfile::tempdir().expect("Failed to create uploads dir");
        let config = test_config(uploads.path().to_path_buf(), batch_size);
        let session_layer = create_session_layer(MemoryStore::default(), &config);

        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(config, store.clone(), store.clone());
        let router = app(state).layer(session_layer);

        Self {
            router,
            store,
            uploads,
        }
    }

    /// Write a file under the uploads directory.
    pub fn write_upload(&self, relative_path: &str, contents: &[u8]) {
        let path = self.uploads.path().join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create upload dirs");
        }
        std::fs::write(path, contents).expect("Failed to write upload");
    }

    #[must_use]
    pub fn uploads_dir(&self) -> &Path {
        self.uploads.path()
    }

    /// Send one request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, path: &str, session: Option<&TestSession>) -> Response<Body> {
        let mut builder = Request::get(path);
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, &session.cookie);
        }
        self.send(builder.body(Body::empty()).expect("valid request"))
            .await
    }

    /// POST an urlencoded form.
    pub async fn post_form(
        &self,
        path: &str,
        session: Option<&TestSession>,
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        let mut builder = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, &session.cookie);
        }
        self.send(builder.body(Body::from(body)).expect("valid request"))
            .await
    }

    /// Sign in with an access key, then fetch the session's CSRF token.
    ///
    /// Panics if the key is rejected.
    pub async fn login(&self, access_key: &str) -> TestSession {
        let response = self
            .post_form("/auth/login", None, &[("access_key", access_key)])
            .await;
        assert_eq!(
            response.status(),
            StatusCode::SEE_OTHER,
            "login with test key should redirect"
        );

        let cookie = session_cookie(&response).expect("login should set a session cookie");
        let mut session = TestSession {
            cookie,
            csrf_token: None,
        };

        let response = self.get("/api/exports/token", Some(&session)).await;
        if response.status() == StatusCode::OK {
            let TokenResponse { token } =
                serde_json::from_slice(&body_bytes(response).await).expect("token JSON");
            session.csrf_token = Some(token);
        }

        session
    }
}

/// `name=value` of the `Set-Cookie` header, if one was sent.
#[must_use]
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("body is UTF-8")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body is JSON")
}

/// Header value as a string, or "" when absent.
#[must_use]
pub fn header_str<'a>(response: &'a Response<Body>, name: header::HeaderName) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Noon on the given day of January 2024.
#[must_use]
pub fn jan(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid test date")
}
