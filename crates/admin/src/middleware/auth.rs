//! Authentication middleware and extractors for admin.
//!
//! Provides extractors for requiring admin authentication in route handlers.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::ExposeSecret;
use tower_sessions::Session;

use woo_porter_core::{AdminRole, BatchResponse};

use crate::config::AccessConfig;
use crate::error::set_sentry_user;
use crate::models::{CurrentAdmin, session_keys};

/// Shown when a signed-in admin lacks the export capability.
pub const FORBIDDEN_MESSAGE: &str = "You do not have sufficient permissions to perform this action.";

/// Shown when no admin is signed in.
pub const UNAUTHORIZED_MESSAGE: &str = "Authentication required.";

/// Extractor that requires admin authentication.
///
/// If the admin is not logged in, returns a redirect to the login page
/// for HTML requests, or 401 Unauthorized for API requests.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminAuth(admin): RequireAdminAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.name)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Extractor that requires an admin holding the export capability.
///
/// Viewers are rejected with 403 before the handler touches any data.
pub struct RequireExportCapability(pub CurrentAdmin);

/// Error returned when the request is not allowed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in, but the role lacks the capability.
    Forbidden { api: bool },
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => api_failure(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE),
            Self::Forbidden { api: true } => api_failure(StatusCode::FORBIDDEN, FORBIDDEN_MESSAGE),
            Self::Forbidden { api: false } => {
                (StatusCode::FORBIDDEN, FORBIDDEN_MESSAGE).into_response()
            }
        }
    }
}

/// JSON failure envelope used by every `/api/` endpoint.
pub fn api_failure(status: StatusCode, message: &str) -> Response {
    (status, Json(BatchResponse::failure(message))).into_response()
}

fn is_api(parts: &Parts) -> bool {
    parts.uri.path().starts_with("/api/")
}

async fn current_admin(parts: &Parts) -> Result<CurrentAdmin, AdminAuthRejection> {
    // Get the session from extensions (set by SessionManagerLayer)
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AdminAuthRejection::Unauthorized)?;

    session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
        .ok_or(if is_api(parts) {
            AdminAuthRejection::Unauthorized
        } else {
            AdminAuthRejection::RedirectToLogin
        })
}

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        set_sentry_user(&admin);
        Ok(Self(admin))
    }
}

impl<S> FromRequestParts<S> for RequireExportCapability
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        set_sentry_user(&admin);

        if !admin.can_export() {
            tracing::warn!(role = %admin.role, path = %parts.uri.path(), "Export denied for role");
            return Err(AdminAuthRejection::Forbidden { api: is_api(parts) });
        }

        Ok(Self(admin))
    }
}

/// Extractor that optionally gets the current admin.
///
/// Unlike `RequireAdminAuth`, this does not reject the request if the admin is not logged in.
pub struct OptionalAdminAuth(pub Option<CurrentAdmin>);

impl<S> FromRequestParts<S> for OptionalAdminAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(admin))
    }
}

/// Role granted by an access key, if any.
#[must_use]
pub fn role_for_key(access: &AccessConfig, presented: &str) -> Option<AdminRole> {
    if constant_time_eq(access.admin_key.expose_secret().as_bytes(), presented.as_bytes()) {
        return Some(AdminRole::Admin);
    }
    access
        .viewer_key
        .as_ref()
        .filter(|key| constant_time_eq(key.expose_secret().as_bytes(), presented.as_bytes()))
        .map(|_| AdminRole::Viewer)
}

/// Compare secrets without short-circuiting on the first differing byte.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Helper to set the current admin in the session.
///
/// Rotates the session id first so a pre-login session cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Helper to end the session entirely (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn access(viewer: Option<&str>) -> AccessConfig {
        AccessConfig {
            admin_key: SecretString::from("k8#Qz!v2Lm@9xWp$"),
            viewer_key: viewer.map(SecretString::from),
        }
    }

    #[test]
    fn test_role_for_key() {
        let access = access(Some("r4%Tn&8sBq*2YhZc"));
        assert_eq!(role_for_key(&access, "k8#Qz!v2Lm@9xWp$"), Some(AdminRole::Admin));
        assert_eq!(role_for_key(&access, "r4%Tn&8sBq*2YhZc"), Some(AdminRole::Viewer));
        assert_eq!(role_for_key(&access, "wrong"), None);
        assert_eq!(role_for_key(&access, ""), None);
    }

    #[test]
    fn test_no_viewer_key_configured() {
        assert_eq!(role_for_key(&access(None), "r4%Tn&8sBq*2YhZc"), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn test_api_forbidden_is_json() {
        let response = AdminAuthRejection::Forbidden { api: true }.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn test_html_unauthenticated_redirects() {
        let response = AdminAuthRejection::RedirectToLogin.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
