//! woo-porter core - shared types library.
//!
//! This crate provides the types shared by every woo-porter component:
//! - `admin` - The admin panel serving the export utilities
//! - `cli` - Command-line tools (session migrations, batched export driver)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no database access,
//! no HTTP clients. Both the server and the export drivers depend on it, so
//! the wire format and the CSV layout can only be defined once.
//!
//! # Modules
//!
//! - [`types`] - Ids, email keys, roles, contact records and batch envelopes
//! - [`shopify_csv`] - Shopify customer CSV encoding

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod shopify_csv;
pub mod types;

pub use types::*;
