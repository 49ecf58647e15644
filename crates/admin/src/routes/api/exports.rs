//! Export API handlers.
//!
//! The batch endpoint is the server half of the resumable customer export.
//! It holds no state between calls: the client carries the offset and keeps
//! the total count from the first page.

use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use woo_porter_core::BatchResponse;

use crate::{
    middleware::{
        RequireExportCapability,
        auth::api_failure,
        csrf::{CSRF_FAILED_MESSAGE, issue_token, verify_token},
    },
    state::AppState,
};

/// Shown when a page cannot be built.
pub const BATCH_FAILED_MESSAGE: &str = "Could not load customers for this batch. Please restart the export.";

/// Build the export API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/exports/token", get(token))
        .route("/api/exports/customers/batch", post(customer_batch))
}

/// Response for the token endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Form fields of a batch request. Both are read leniently.
#[derive(Debug, Default, Deserialize)]
pub struct BatchForm {
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

/// Offset from the request; anything missing, malformed or negative is 0.
#[must_use]
pub fn parse_offset(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

/// Return the session's anti-forgery token for scripted clients.
///
/// GET /api/exports/token
async fn token(
    RequireExportCapability(_admin): RequireExportCapability,
    session: Session,
) -> Response {
    match issue_token(&session).await {
        Ok(token) => Json(TokenResponse { token }).into_response(),
        Err(e) => {
            tracing::error!("Failed to issue CSRF token: {e}");
            api_failure(StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable.")
        }
    }
}

/// Build one page of the customer export.
///
/// POST /api/exports/customers/batch
///
/// Authorization and the anti-forgery token are checked before any data is
/// read. A failed page is reported as `{"success": false}` with no rows.
#[instrument(skip_all, fields(offset = tracing::field::Empty))]
async fn customer_batch(
    RequireExportCapability(_admin): RequireExportCapability,
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    form: Result<Form<BatchForm>, FormRejection>,
) -> Response {
    let form = form.map(|Form(f)| f).unwrap_or_default();

    if !verify_token(&session, &headers, form.csrf_token.as_deref()).await {
        tracing::warn!("Rejected batch request with missing or invalid CSRF token");
        return api_failure(StatusCode::FORBIDDEN, CSRF_FAILED_MESSAGE);
    }

    let offset = parse_offset(form.offset.as_deref());
    tracing::Span::current().record("offset", offset);

    match state
        .customer_exporter()
        .fetch_batch(offset, state.config().batch_size)
        .await
    {
        Ok(page) => Json(BatchResponse::Success(page)).into_response(),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                offset,
                sentry_event_id = %event_id,
                "Customer export batch failed"
            );
            api_failure(StatusCode::INTERNAL_SERVER_ERROR, BATCH_FAILED_MESSAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset_lenient() {
        assert_eq!(parse_offset(Some("500")), 500);
        assert_eq!(parse_offset(Some(" 1000 ")), 1000);
        assert_eq!(parse_offset(Some("-5")), 0);
        assert_eq!(parse_offset(Some("abc")), 0);
        assert_eq!(parse_offset(Some("")), 0);
        assert_eq!(parse_offset(Some("12.5")), 0);
        assert_eq!(parse_offset(None), 0);
    }
}
