//! Authentication route handlers for admin.
//!
//! Operators sign in with an access key from the environment. The key
//! decides the role: the admin key may export, the viewer key may only look.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::middleware::auth::role_for_key;
use crate::middleware::csrf::rotate_token;
use crate::middleware::{OptionalAdminAuth, clear_current_admin, set_current_admin};
use crate::models::CurrentAdmin;
use crate::state::AppState;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

/// Query parameters for login page messages.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub access_key: String,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", post(logout))
}

/// Render the login page.
///
/// GET /auth/login
async fn login_page(
    OptionalAdminAuth(admin): OptionalAdminAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if admin.is_some() {
        return Redirect::to("/").into_response();
    }

    let error = query.error.as_deref().map(|code| match code {
        "session" => "Could not start a session. Please try again.".to_string(),
        _ => "Invalid access key.".to_string(),
    });

    LoginTemplate { error }.into_response()
}

/// Exchange an access key for a session.
///
/// POST /auth/login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let Some(role) = role_for_key(&state.config().access, form.access_key.trim()) else {
        tracing::warn!("Login failed: unknown access key");
        return (
            StatusCode::UNAUTHORIZED,
            LoginTemplate {
                error: Some("Invalid access key.".to_string()),
            },
        )
            .into_response();
    };

    let admin = CurrentAdmin::with_role(role);
    if let Err(e) = set_current_admin(&session, &admin).await {
        tracing::error!("Failed to set session: {}", e);
        return Redirect::to("/auth/login?error=session").into_response();
    }
    if let Err(e) = rotate_token(&session).await {
        tracing::error!("Failed to issue CSRF token: {}", e);
        return Redirect::to("/auth/login?error=session").into_response();
    }

    tracing::info!(role = %admin.role, "Admin signed in");
    Redirect::to("/").into_response()
}

/// Logout and clear session.
///
/// POST /auth/logout
async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_admin(&session).await {
        tracing::warn!("Failed to clear session: {}", e);
    }

    Redirect::to("/auth/login")
}
