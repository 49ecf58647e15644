//! Business logic services for admin.
//!
//! # Services
//!
//! - `customer_export` - Customer reconciliation and batched CSV export
//! - `media_export` - Product image, unused image and PDF ZIP downloads

pub mod customer_export;
pub mod media_export;

pub use customer_export::CustomerExporter;
pub use media_export::{ExportError, MediaExporter, ZipExport};
