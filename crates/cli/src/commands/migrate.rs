//! Database migration commands.
//!
//! The WordPress tables belong to WordPress and are never migrated here.
//! The only table woo-porter owns is the admin session table.
//!
//! # Usage
//!
//! ```bash
//! wpx migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` - MySQL connection string (falls back to `DATABASE_URL`)

use secrecy::SecretString;
use thiserror::Error;

use woo_porter_admin::db::create_pool;
use woo_porter_admin::middleware::create_session_store;
use woo_porter_admin::middleware::session::SESSION_TABLE_NAME;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn database_url() -> Result<SecretString, MigrationError> {
    std::env::var("ADMIN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("ADMIN_DATABASE_URL"))
}

/// Create the session table used by the admin panel.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or the table
/// cannot be created.
pub async fn sessions() -> Result<(), MigrationError> {
    let _ = dotenvy::dotenv();

    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!(table = SESSION_TABLE_NAME, "Creating session table...");
    create_session_store(&pool).migrate().await?;

    tracing::info!("Session table ready");
    Ok(())
}
