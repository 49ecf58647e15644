//! In-memory store for tests.
//!
//! Mirrors the query semantics of [`crate::db::WooStore`]: order statuses
//! `auto-draft`, `draft` and `trash` are invisible, email matching is
//! case-insensitive, and the latest order wins by date then id.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use secrecy::SecretString;

use woo_porter_core::{AttachmentId, BillingFields, OrderId, ProductId, UserId};

use crate::config::{AccessConfig, AdminConfig, WordPressConfig};
use crate::db::{
    Attachment, CustomerStore, GuestOrder, MediaStore, ProductDescription, ProductImageRefs,
    RegisteredCustomer, RepositoryError,
};

/// Access key accepted by [`test_config`] for the admin role.
pub const TEST_ADMIN_KEY: &str = "t3st-Adm1n#Key!9xQ";

/// Access key accepted by [`test_config`] for the viewer role.
pub const TEST_VIEWER_KEY: &str = "v1ew-Only$Key&4zR";

/// Public uploads URL used by [`test_config`].
pub const TEST_UPLOADS_URL: &str = "https://shop.example.com/wp-content/uploads";

const HIDDEN_ORDER_STATUSES: [&str; 3] = ["auto-draft", "draft", "trash"];

/// A stored order as the fixture sees it.
#[derive(Debug, Clone)]
pub struct FixtureOrder {
    pub id: OrderId,
    pub status: String,
    pub billing_email: String,
    pub billing: BillingFields,
    pub created_at: NaiveDateTime,
}

/// A stored attachment with its mime type.
#[derive(Debug, Clone)]
pub struct FixtureAttachment {
    pub attachment: Attachment,
    pub mime_type: String,
}

#[derive(Default)]
struct Data {
    users: Vec<RegisteredCustomer>,
    orders: Vec<FixtureOrder>,
    descriptions: Vec<ProductDescription>,
    image_refs: Vec<ProductImageRefs>,
    attachments: Vec<FixtureAttachment>,
}

/// Store backed by plain vectors, with failure injection.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<Data>,
    fail: AtomicBool,
    queries: AtomicUsize,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registered account.
    pub fn add_user(&self, user: RegisteredCustomer) {
        self.lock().users.push(user);
    }

    /// Add an order.
    pub fn add_order(&self, order: FixtureOrder) {
        self.lock().orders.push(order);
    }

    /// Add a published product with a description and image references.
    pub fn add_product(
        &self,
        id: ProductId,
        content: &str,
        thumbnail_id: Option<AttachmentId>,
        gallery: &str,
    ) {
        let mut data = self.lock();
        data.descriptions.push(ProductDescription {
            product_id: id,
            content: content.to_string(),
        });
        data.image_refs.push(ProductImageRefs {
            product_id: id,
            thumbnail_id,
            gallery: gallery.to_string(),
        });
    }

    /// Add a media-library attachment.
    pub fn add_attachment(&self, id: AttachmentId, relative_path: &str, mime_type: &str) {
        self.lock().attachments.push(FixtureAttachment {
            attachment: Attachment {
                id,
                relative_path: relative_path.to_string(),
            },
            mime_type: mime_type.to_string(),
        });
    }

    /// Make every subsequent query fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Number of queries served so far, failed ones included.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Data> {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn begin_query(&self) -> Result<std::sync::MutexGuard<'_, Data>, RepositoryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "injected store failure".to_string(),
            ));
        }
        Ok(self.lock())
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn visible(order: &FixtureOrder) -> bool {
    !HIDDEN_ORDER_STATUSES.contains(&order.status.as_str())
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn list_distinct_billing_emails(&self) -> Result<Vec<String>, RepositoryError> {
        let data = self.begin_query()?;
        let mut emails: Vec<String> = data
            .orders
            .iter()
            .filter(|o| visible(o) && !o.billing_email.is_empty())
            .map(|o| o.billing_email.clone())
            .collect();
        emails.sort();
        emails.dedup();
        Ok(emails)
    }

    async fn list_user_emails(&self) -> Result<Vec<String>, RepositoryError> {
        let data = self.begin_query()?;
        Ok(data
            .users
            .iter()
            .filter(|u| !u.email.is_empty())
            .map(|u| u.email.clone())
            .collect())
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<RegisteredCustomer>, RepositoryError> {
        let data = self.begin_query()?;
        Ok(data
            .users
            .iter()
            .filter(|u| same_email(&u.email, email))
            .min_by_key(|u| u.user_id)
            .cloned())
    }

    async fn find_latest_order_by_billing_email(
        &self,
        email: &str,
    ) -> Result<Option<GuestOrder>, RepositoryError> {
        let data = self.begin_query()?;
        Ok(data
            .orders
            .iter()
            .filter(|o| visible(o) && same_email(&o.billing_email, email))
            .max_by_key(|o| (o.created_at, o.id))
            .map(|o| GuestOrder {
                order_id: o.id,
                billing_email: o.billing_email.clone(),
                billing: o.billing.clone(),
                created_at: o.created_at,
            }))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.begin_query().map(|_| ())
    }
}

#[async_trait]
impl MediaStore for InMemoryStore {
    async fn list_product_descriptions(&self) -> Result<Vec<ProductDescription>, RepositoryError> {
        Ok(self.begin_query()?.descriptions.clone())
    }

    async fn list_product_image_refs(&self) -> Result<Vec<ProductImageRefs>, RepositoryError> {
        Ok(self.begin_query()?.image_refs.clone())
    }

    async fn list_image_attachments(&self) -> Result<Vec<Attachment>, RepositoryError> {
        let data = self.begin_query()?;
        Ok(data
            .attachments
            .iter()
            .filter(|a| a.mime_type.starts_with("image/"))
            .map(|a| a.attachment.clone())
            .collect())
    }

    async fn list_pdf_attachments(&self) -> Result<Vec<Attachment>, RepositoryError> {
        let data = self.begin_query()?;
        Ok(data
            .attachments
            .iter()
            .filter(|a| a.mime_type == "application/pdf")
            .map(|a| a.attachment.clone())
            .collect())
    }
}

/// Convenience constructor for a registered account.
#[must_use]
pub fn registered(id: u64, email: &str, billing: BillingFields) -> RegisteredCustomer {
    RegisteredCustomer {
        user_id: UserId::new(id),
        email: email.to_string(),
        billing,
        profile_first_name: String::new(),
        profile_last_name: String::new(),
    }
}

/// Convenience constructor for a completed order.
#[must_use]
pub fn order(
    id: u64,
    billing_email: &str,
    billing: BillingFields,
    created_at: NaiveDateTime,
) -> FixtureOrder {
    FixtureOrder {
        id: OrderId::new(id),
        status: "wc-completed".to_string(),
        billing_email: billing_email.to_string(),
        billing,
        created_at,
    }
}

/// Billing fields with just a name set.
#[must_use]
pub fn named(first: &str, last: &str) -> BillingFields {
    BillingFields {
        first_name: first.to_string(),
        last_name: last.to_string(),
        ..BillingFields::default()
    }
}

/// Configuration for tests: plain HTTP, both access keys, given uploads dir.
#[must_use]
pub fn test_config(uploads_dir: PathBuf, batch_size: u32) -> AdminConfig {
    AdminConfig {
        database_url: SecretString::from("mysql://test@localhost/wordpress"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3001,
        base_url: "http://localhost:3001".to_string(),
        session_secret: SecretString::from("test-session-secret-at-least-32-chars"),
        access: AccessConfig {
            admin_key: SecretString::from(TEST_ADMIN_KEY),
            viewer_key: Some(SecretString::from(TEST_VIEWER_KEY)),
        },
        wordpress: WordPressConfig {
            table_prefix: "wp_".to_string(),
            uploads_dir,
            uploads_url: TEST_UPLOADS_URL.to_string(),
        },
        batch_size,
        json_logs: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
        tls: None,
    }
}
