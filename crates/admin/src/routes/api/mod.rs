//! API route handlers for admin.
//!
//! JSON endpoints used by the in-browser export driver and `wpx`.

pub mod exports;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new().merge(exports::router())
}
