//! HTTP middleware for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with MySQL store)
//!
//! Authentication and the export capability are enforced per handler by the
//! extractors in [`auth`]; anti-forgery tokens by [`csrf`].

pub mod auth;
pub mod csrf;
pub mod session;

pub use auth::{
    OptionalAdminAuth, RequireAdminAuth, RequireExportCapability, clear_current_admin,
    set_current_admin,
};
pub use session::{create_session_layer, create_session_store};
