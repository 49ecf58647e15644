//! Domain models for admin.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
pub use woo_porter_core::AdminRole;
