//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Liveness check
//! GET  /health/ready                 - Readiness check (database)
//!
//! # Dashboard
//! GET  /                             - Export menu
//!
//! # Auth (access key exchanged for a session)
//! GET  /auth/login                   - Login page
//! POST /auth/login                   - Check access key, open session
//! POST /auth/logout                  - Logout
//!
//! # Media exports (ZIP)
//! GET  /exports/product-images       - Page with download button
//! POST /exports/product-images       - Images used in product descriptions
//! GET  /exports/unused-images        - Page with download button
//! POST /exports/unused-images        - Images no product uses
//! GET  /exports/pdfs                 - Page with download button
//! POST /exports/pdfs                 - Every PDF attachment
//!
//! # Customer export (Shopify CSV)
//! GET  /exports/customers            - Page with download button
//! POST /exports/customers            - Whole CSV in one request
//! GET  /exports/customers/batched    - Browser-driven batched export
//!
//! # API (JSON)
//! GET  /api/exports/token            - Anti-forgery token for scripts
//! POST /api/exports/customers/batch  - One page of contacts
//! ```
//!
//! Every export route requires the export capability; the POST routes also
//! require the session's anti-forgery token. Both are checked before any
//! data is read.

pub mod api;
pub mod auth;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod media;

use axum::Router;

use crate::state::AppState;

/// One entry of the export menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPage {
    pub path: &'static str,
    pub menu_label: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub button_label: &'static str,
}

pub const PRODUCT_IMAGES_PAGE: ExportPage = ExportPage {
    path: "/exports/product-images",
    menu_label: "Export Product Images",
    title: "Export All Images from Product Descriptions",
    description: "This will create a ZIP file containing all images used in the long descriptions of your WooCommerce products.",
    button_label: "Download All Product Images",
};

pub const UNUSED_IMAGES_PAGE: ExportPage = ExportPage {
    path: "/exports/unused-images",
    menu_label: "Export Unused Product Images",
    title: "Export Unused Product Images",
    description: "This will create a ZIP file containing all images from your Media Library that are NOT used in WooCommerce products.",
    button_label: "Download Unused Images",
};

pub const PDFS_PAGE: ExportPage = ExportPage {
    path: "/exports/pdfs",
    menu_label: "Export PDFs",
    title: "Export All PDFs from Media Library",
    description: "This will create a ZIP file containing all PDF files uploaded to your WordPress media library.",
    button_label: "Download All PDFs",
};

pub const CUSTOMERS_PAGE: ExportPage = ExportPage {
    path: "/exports/customers",
    menu_label: "Export for Shopify",
    title: "Export Customers for Shopify",
    description: "Click the button below to generate a CSV file of your WooCommerce customers. This file is formatted for direct import into Shopify.",
    button_label: "Download Shopify Customer CSV",
};

pub const CUSTOMERS_BATCHED_PAGE: ExportPage = ExportPage {
    path: "/exports/customers/batched",
    menu_label: "Export for Shopify (Batched)",
    title: "Export Customers for Shopify (Batched)",
    description: "For large stores. Customers are fetched page by page and the CSV file is assembled in your browser.",
    button_label: "Start Export",
};

/// The export menu, in display order.
pub const MENU: [ExportPage; 5] = [
    PRODUCT_IMAGES_PAGE,
    UNUSED_IMAGES_PAGE,
    PDFS_PAGE,
    CUSTOMERS_PAGE,
    CUSTOMERS_BATCHED_PAGE,
];

/// Build the complete admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(dashboard::router())
        .merge(auth::router())
        .merge(media::router())
        .merge(customers::router())
        .merge(api::router())
}
