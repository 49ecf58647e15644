//! Application state shared across handlers.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::config::AdminConfig;
use crate::db::{CustomerStore, MediaStore, WooStore};
use crate::services::{CustomerExporter, MediaExporter};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    customers: Arc<dyn CustomerStore>,
    media: Arc<dyn MediaStore>,
}

impl AppState {
    /// Create state over explicit stores.
    #[must_use]
    pub fn new(
        config: AdminConfig,
        customers: Arc<dyn CustomerStore>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                customers,
                media,
            }),
        }
    }

    /// Create state backed by the WordPress database.
    #[must_use]
    pub fn from_woo_store(config: AdminConfig, store: WooStore) -> Self {
        let store = Arc::new(store);
        Self::new(config, store.clone(), store)
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn customers(&self) -> &Arc<dyn CustomerStore> {
        &self.inner.customers
    }

    /// Exporter stamping rows with today's date (UTC).
    #[must_use]
    pub fn customer_exporter(&self) -> CustomerExporter {
        CustomerExporter::new(self.inner.customers.clone(), today())
    }

    #[must_use]
    pub fn media_exporter(&self) -> MediaExporter {
        let wordpress = &self.inner.config.wordpress;
        MediaExporter::new(
            self.inner.media.clone(),
            wordpress.uploads_dir.clone(),
            wordpress.uploads_url.clone(),
        )
    }
}

/// Current date used for notes and download filenames.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
