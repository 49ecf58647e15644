//! Session middleware configuration for admin.
//!
//! Sets up MySQL-backed sessions using tower-sessions with
//! strict cookie settings (SameSite=Strict, 8hr inactivity expiry).

use sqlx::MySqlPool;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::MySqlStore;

use crate::config::AdminConfig;

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "woo_porter_session";

/// Table holding admin sessions, next to the WordPress tables.
pub const SESSION_TABLE_NAME: &str = "woo_porter_sessions";

/// Session expiry time in seconds (8 hours of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 8 * 60 * 60;

/// Create the MySQL session store.
///
/// The table must exist; create it with `wpx migrate`.
///
/// # Panics
///
/// Panics if the table name is invalid (should never happen with the
/// hardcoded name).
#[must_use]
pub fn create_session_store(pool: &MySqlPool) -> MySqlStore {
    MySqlStore::new(pool.clone())
        .with_table_name(SESSION_TABLE_NAME)
        .expect("valid table name")
}

/// Wrap a store in the session layer.
///
/// # Arguments
///
/// * `store` - Session store (MySQL in production, memory in tests)
/// * `config` - Admin configuration (for determining HTTPS mode)
#[must_use]
pub fn create_session_layer<S>(store: S, config: &AdminConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
