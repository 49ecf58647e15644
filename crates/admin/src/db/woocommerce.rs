//! `sqlx` implementation of the store traits over the WordPress schema.
//!
//! Queries are built at runtime because the table prefix is site
//! configuration; the prefix is validated to `[A-Za-z0-9_]+` when the config
//! is loaded, and every value is bound as a parameter.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::MySqlPool;
use tracing::instrument;

use woo_porter_core::{AttachmentId, BillingFields, OrderId, ProductId, UserId};

use super::{
    Attachment, CustomerStore, GuestOrder, MediaStore, ProductDescription, ProductImageRefs,
    RegisteredCustomer, RepositoryError,
};

/// Order statuses that never count as a purchase.
const EXCLUDED_ORDER_STATUSES: &str = "'auto-draft', 'draft', 'trash'";

/// Billing field names shared by `billing_*` user meta and `_billing_*`
/// order meta.
const BILLING_FIELDS: [&str; 10] = [
    "first_name",
    "last_name",
    "company",
    "address_1",
    "address_2",
    "city",
    "state",
    "country",
    "postcode",
    "phone",
];

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    #[sqlx(rename = "ID")]
    id: u64,
    user_email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct MetaRow {
    meta_key: Option<String>,
    meta_value: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    #[sqlx(rename = "ID")]
    id: u64,
    billing_email: Option<String>,
    post_date: NaiveDateTime,
}

#[derive(Debug, sqlx::FromRow)]
struct DescriptionRow {
    #[sqlx(rename = "ID")]
    id: u64,
    post_content: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRefsRow {
    #[sqlx(rename = "ID")]
    id: u64,
    thumbnail_id: Option<String>,
    gallery: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct AttachmentRow {
    #[sqlx(rename = "ID")]
    id: u64,
    attached_file: Option<String>,
}

impl AttachmentRow {
    /// Attachments without a stored file path cannot be exported.
    fn into_attachment(self) -> Option<Attachment> {
        let relative_path = self.attached_file.filter(|f| !f.trim().is_empty())?;
        Some(Attachment {
            id: AttachmentId::new(self.id),
            relative_path,
        })
    }
}

/// Collapse meta rows into a key/value map; the first row wins for
/// duplicated keys, like `get_user_meta(.., true)`.
fn meta_map(rows: Vec<MetaRow>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for row in rows {
        if let Some(key) = row.meta_key {
            map.entry(key).or_insert_with(|| row.meta_value.unwrap_or_default());
        }
    }
    map
}

/// Build billing fields from meta keyed `{key_prefix}{field}`.
fn billing_from_meta(meta: &HashMap<String, String>, key_prefix: &str) -> BillingFields {
    let get = |field: &str| {
        meta.get(&format!("{key_prefix}{field}"))
            .cloned()
            .unwrap_or_default()
    };

    BillingFields {
        first_name: get("first_name"),
        last_name: get("last_name"),
        company: get("company"),
        address_1: get("address_1"),
        address_2: get("address_2"),
        city: get("city"),
        state: get("state"),
        country: get("country"),
        postcode: get("postcode"),
        phone: get("phone"),
    }
}

/// `'k1', 'k2', ...` for the billing meta keys with the given prefix.
fn billing_key_list(key_prefix: &str) -> String {
    BILLING_FIELDS
        .iter()
        .map(|field| format!("'{key_prefix}{field}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Repository
// =============================================================================

/// WordPress/WooCommerce store backed by a MySQL pool.
#[derive(Clone)]
pub struct WooStore {
    pool: MySqlPool,
    prefix: String,
}

impl WooStore {
    /// Create a store over `pool` for tables named `{prefix}posts` etc.
    #[must_use]
    pub fn new(pool: MySqlPool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn table(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    async fn list_attachments(&self, mime_filter: &str) -> Result<Vec<Attachment>, RepositoryError> {
        let sql = format!(
            r"
            SELECT p.ID, pm.meta_value AS attached_file
            FROM {posts} p
            LEFT JOIN {postmeta} pm
                ON pm.post_id = p.ID AND pm.meta_key = '_wp_attached_file'
            WHERE p.post_type = 'attachment'
              AND p.post_status = 'inherit'
              AND {mime_filter}
            ORDER BY p.ID
            ",
            posts = self.table("posts"),
            postmeta = self.table("postmeta"),
        );

        let rows = sqlx::query_as::<_, AttachmentRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(AttachmentRow::into_attachment)
            .collect())
    }
}

#[async_trait]
impl CustomerStore for WooStore {
    #[instrument(skip(self))]
    async fn list_distinct_billing_emails(&self) -> Result<Vec<String>, RepositoryError> {
        let sql = format!(
            r"
            SELECT DISTINCT pm.meta_value
            FROM {postmeta} pm
            INNER JOIN {posts} p ON p.ID = pm.post_id
            WHERE pm.meta_key = '_billing_email'
              AND p.post_type = 'shop_order'
              AND p.post_status NOT IN ({EXCLUDED_ORDER_STATUSES})
              AND pm.meta_value IS NOT NULL
              AND pm.meta_value <> ''
            ",
            postmeta = self.table("postmeta"),
            posts = self.table("posts"),
        );

        let emails = sqlx::query_scalar::<_, Option<String>>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(emails.into_iter().flatten().collect())
    }

    #[instrument(skip(self))]
    async fn list_user_emails(&self) -> Result<Vec<String>, RepositoryError> {
        let sql = format!(
            "SELECT user_email FROM {users} WHERE user_email <> ''",
            users = self.table("users"),
        );

        Ok(sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    #[instrument(skip(self))]
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<RegisteredCustomer>, RepositoryError> {
        let sql = format!(
            r"
            SELECT ID, user_email
            FROM {users}
            WHERE LOWER(TRIM(user_email)) = LOWER(TRIM(?))
            ORDER BY ID
            LIMIT 1
            ",
            users = self.table("users"),
        );

        let Some(user) = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let meta_sql = format!(
            r"
            SELECT meta_key, meta_value
            FROM {usermeta}
            WHERE user_id = ?
              AND meta_key IN ('first_name', 'last_name', {billing_keys})
            ORDER BY umeta_id
            ",
            usermeta = self.table("usermeta"),
            billing_keys = billing_key_list("billing_"),
        );

        let meta = meta_map(
            sqlx::query_as::<_, MetaRow>(&meta_sql)
                .bind(user.id)
                .fetch_all(&self.pool)
                .await?,
        );

        Ok(Some(RegisteredCustomer {
            user_id: UserId::new(user.id),
            email: user.user_email,
            billing: billing_from_meta(&meta, "billing_"),
            profile_first_name: meta.get("first_name").cloned().unwrap_or_default(),
            profile_last_name: meta.get("last_name").cloned().unwrap_or_default(),
        }))
    }

    #[instrument(skip(self))]
    async fn find_latest_order_by_billing_email(
        &self,
        email: &str,
    ) -> Result<Option<GuestOrder>, RepositoryError> {
        let sql = format!(
            r"
            SELECT p.ID, pm.meta_value AS billing_email, p.post_date
            FROM {posts} p
            INNER JOIN {postmeta} pm
                ON pm.post_id = p.ID AND pm.meta_key = '_billing_email'
            WHERE p.post_type = 'shop_order'
              AND p.post_status NOT IN ({EXCLUDED_ORDER_STATUSES})
              AND LOWER(TRIM(pm.meta_value)) = LOWER(TRIM(?))
            ORDER BY p.post_date DESC, p.ID DESC
            LIMIT 1
            ",
            posts = self.table("posts"),
            postmeta = self.table("postmeta"),
        );

        let Some(order) = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let meta_sql = format!(
            r"
            SELECT meta_key, meta_value
            FROM {postmeta}
            WHERE post_id = ?
              AND meta_key IN ({billing_keys})
            ORDER BY meta_id
            ",
            postmeta = self.table("postmeta"),
            billing_keys = billing_key_list("_billing_"),
        );

        let meta = meta_map(
            sqlx::query_as::<_, MetaRow>(&meta_sql)
                .bind(order.id)
                .fetch_all(&self.pool)
                .await?,
        );

        Ok(Some(GuestOrder {
            order_id: OrderId::new(order.id),
            billing_email: order.billing_email.unwrap_or_else(|| email.to_owned()),
            billing: billing_from_meta(&meta, "_billing_"),
            created_at: order.post_date,
        }))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaStore for WooStore {
    #[instrument(skip(self))]
    async fn list_product_descriptions(&self) -> Result<Vec<ProductDescription>, RepositoryError> {
        let sql = format!(
            r"
            SELECT ID, post_content
            FROM {posts}
            WHERE post_type = 'product' AND post_status = 'publish'
            ORDER BY ID
            ",
            posts = self.table("posts"),
        );

        let rows = sqlx::query_as::<_, DescriptionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ProductDescription {
                product_id: ProductId::new(row.id),
                content: row.post_content,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_product_image_refs(&self) -> Result<Vec<ProductImageRefs>, RepositoryError> {
        let sql = format!(
            r"
            SELECT p.ID,
                (SELECT meta_value FROM {postmeta}
                 WHERE post_id = p.ID AND meta_key = '_thumbnail_id'
                 ORDER BY meta_id LIMIT 1) AS thumbnail_id,
                (SELECT meta_value FROM {postmeta}
                 WHERE post_id = p.ID AND meta_key = '_product_image_gallery'
                 ORDER BY meta_id LIMIT 1) AS gallery
            FROM {posts} p
            WHERE p.post_type = 'product' AND p.post_status = 'publish'
            ORDER BY p.ID
            ",
            posts = self.table("posts"),
            postmeta = self.table("postmeta"),
        );

        let rows = sqlx::query_as::<_, ImageRefsRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ProductImageRefs {
                product_id: ProductId::new(row.id),
                thumbnail_id: row
                    .thumbnail_id
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .filter(|id| *id != 0)
                    .map(AttachmentId::new),
                gallery: row.gallery.unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_image_attachments(&self) -> Result<Vec<Attachment>, RepositoryError> {
        self.list_attachments("p.post_mime_type LIKE 'image/%'").await
    }

    #[instrument(skip(self))]
    async fn list_pdf_attachments(&self) -> Result<Vec<Attachment>, RepositoryError> {
        self.list_attachments("p.post_mime_type = 'application/pdf'")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(key: &str, value: &str) -> MetaRow {
        MetaRow {
            meta_key: Some(key.to_string()),
            meta_value: Some(value.to_string()),
        }
    }

    #[test]
    fn test_meta_map_first_row_wins() {
        let map = meta_map(vec![
            meta("billing_city", "Springfield"),
            meta("billing_city", "Shelbyville"),
            MetaRow {
                meta_key: Some("billing_phone".to_string()),
                meta_value: None,
            },
        ]);
        assert_eq!(map.get("billing_city").map(String::as_str), Some("Springfield"));
        assert_eq!(map.get("billing_phone").map(String::as_str), Some(""));
    }

    #[test]
    fn test_billing_from_meta_uses_key_prefix() {
        let map = meta_map(vec![
            meta("_billing_first_name", "Jane"),
            meta("_billing_postcode", "62701"),
            meta("billing_first_name", "Ignored"),
        ]);
        let billing = billing_from_meta(&map, "_billing_");
        assert_eq!(billing.first_name, "Jane");
        assert_eq!(billing.postcode, "62701");
        assert!(billing.last_name.is_empty());
    }

    #[test]
    fn test_billing_key_list() {
        let keys = billing_key_list("billing_");
        assert!(keys.starts_with("'billing_first_name', 'billing_last_name'"));
        assert!(keys.ends_with("'billing_phone'"));
    }

    #[test]
    fn test_attachment_without_file_is_skipped() {
        let missing = AttachmentRow {
            id: 3,
            attached_file: None,
        };
        assert!(missing.into_attachment().is_none());

        let present = AttachmentRow {
            id: 4,
            attached_file: Some("2024/05/photo.jpg".to_string()),
        };
        let attachment = present.into_attachment().expect("attachment");
        assert_eq!(attachment.id, AttachmentId::new(4));
        assert_eq!(attachment.relative_path, "2024/05/photo.jpg");
    }
}
