//! Anti-forgery tokens.
//!
//! Each session gets one random token, rendered into every export form and
//! served by `/api/exports/token`. State-changing requests must echo it back
//! in the `csrf_token` form field or the `X-CSRF-Token` header.

use axum::http::HeaderMap;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::constant_time_eq;
use crate::models::session_keys;

/// Header accepted in place of the form field.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Shown when the token is missing or wrong.
pub const CSRF_FAILED_MESSAGE: &str = "Security check failed. Please go back and try again.";

/// Return this session's token, issuing one if needed.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn issue_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(session_keys::CSRF_TOKEN).await? {
        return Ok(token);
    }

    let token = Uuid::new_v4().to_string();
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

/// Replace the session's token, e.g. after login.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn rotate_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    let token = Uuid::new_v4().to_string();
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

/// Check a presented token against the session's.
///
/// The form field wins over the header when both are present. A session
/// without a token never verifies.
pub async fn verify_token(session: &Session, headers: &HeaderMap, form_token: Option<&str>) -> bool {
    let presented = form_token
        .filter(|t| !t.is_empty())
        .or_else(|| headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()));

    let Some(presented) = presented else {
        return false;
    };

    match session.get::<String>(session_keys::CSRF_TOKEN).await {
        Ok(Some(expected)) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read CSRF token from session");
            false
        }
    }
}

/// Like [`verify_token`], as an `AppError::Forbidden` for handlers.
///
/// # Errors
///
/// Returns `AppError::Forbidden` when the token does not verify.
pub async fn require_token(
    session: &Session,
    headers: &HeaderMap,
    form_token: Option<&str>,
) -> Result<(), AppError> {
    if verify_token(session, headers, form_token).await {
        Ok(())
    } else {
        tracing::warn!("Rejected request with missing or invalid CSRF token");
        Err(AppError::Forbidden(CSRF_FAILED_MESSAGE.to_string()))
    }
}
