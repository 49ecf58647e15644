//! Read-only access to the WordPress / WooCommerce database.
//!
//! # Database: the WordPress MySQL schema (owned by WordPress)
//!
//! ## Tables read
//!
//! - `{prefix}posts` - products (`product`), orders (`shop_order`) and
//!   media-library attachments (`attachment`)
//! - `{prefix}postmeta` - order billing fields (`_billing_*`), featured image
//!   (`_thumbnail_id`), gallery (`_product_image_gallery`), attachment file
//!   path (`_wp_attached_file`)
//! - `{prefix}users` - registered account emails
//! - `{prefix}usermeta` - account billing profile (`billing_*`) and profile
//!   names (`first_name`, `last_name`)
//!
//! The exports never write to these tables. The only table this service
//! owns is the session table, created by `wpx migrate`.
//!
//! The exporters talk to the database through the [`CustomerStore`] and
//! [`MediaStore`] traits so they can be exercised against in-memory data.

pub mod woocommerce;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use secrecy::ExposeSecret;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use thiserror::Error;

use woo_porter_core::{AttachmentId, BillingFields, OrderId, ProductId, UserId};

pub use woocommerce::WooStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// Source Records
// =============================================================================

/// A registered WordPress account and its WooCommerce billing profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCustomer {
    pub user_id: UserId,
    /// `users.user_email`, original case.
    pub email: String,
    /// `billing_*` user meta.
    pub billing: BillingFields,
    /// `first_name` user meta (profile screen).
    pub profile_first_name: String,
    /// `last_name` user meta (profile screen).
    pub profile_last_name: String,
}

/// The most recent qualifying order for a guest email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestOrder {
    pub order_id: OrderId,
    /// `_billing_email` post meta, original case.
    pub billing_email: String,
    /// `_billing_*` post meta.
    pub billing: BillingFields,
    pub created_at: NaiveDateTime,
}

/// A published product's long description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDescription {
    pub product_id: ProductId,
    pub content: String,
}

/// Images a published product uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductImageRefs {
    pub product_id: ProductId,
    /// `_thumbnail_id` post meta.
    pub thumbnail_id: Option<AttachmentId>,
    /// `_product_image_gallery` post meta: comma-separated attachment ids.
    pub gallery: String,
}

/// A media-library attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: AttachmentId,
    /// `_wp_attached_file` post meta, relative to the uploads directory.
    pub relative_path: String,
}

// =============================================================================
// Repository Interfaces
// =============================================================================

/// Order and account data needed by the customer exporter.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Distinct non-empty `_billing_email` values of orders that are not
    /// drafts or trashed. Case is preserved; callers normalize.
    async fn list_distinct_billing_emails(&self) -> Result<Vec<String>, RepositoryError>;

    /// All non-empty registered account emails.
    async fn list_user_emails(&self) -> Result<Vec<String>, RepositoryError>;

    /// Find the account whose email matches case-insensitively.
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<RegisteredCustomer>, RepositoryError>;

    /// Most recent non-draft, non-trashed order whose billing email matches
    /// case-insensitively.
    async fn find_latest_order_by_billing_email(
        &self,
        email: &str,
    ) -> Result<Option<GuestOrder>, RepositoryError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Product and attachment data needed by the media exporters.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Long descriptions of all published products.
    async fn list_product_descriptions(&self) -> Result<Vec<ProductDescription>, RepositoryError>;

    /// Featured and gallery image references of all published products.
    async fn list_product_image_refs(&self) -> Result<Vec<ProductImageRefs>, RepositoryError>;

    /// Every attachment with an `image/*` mime type.
    async fn list_image_attachments(&self) -> Result<Vec<Attachment>, RepositoryError>;

    /// Every attachment with the `application/pdf` mime type.
    async fn list_pdf_attachments(&self) -> Result<Vec<Attachment>, RepositoryError>;
}

/// Create a MySQL connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - MySQL connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
