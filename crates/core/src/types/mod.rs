//! Core types for woo-porter.
//!
//! This module provides type-safe wrappers for the export domain.

pub mod batch;
pub mod contact;
pub mod email;
pub mod id;
pub mod role;

pub use batch::{BatchResponse, BatchResult, TotalCount};
pub use contact::{BillingFields, ContactRecord, ContactSource, resolve_names};
pub use email::{EmailError, EmailKey};
pub use id::*;
pub use role::AdminRole;
