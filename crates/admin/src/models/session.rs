//! Session-related types for admin authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use woo_porter_core::AdminRole;

/// Display name for sessions opened with the admin access key.
pub const ADMIN_DISPLAY_NAME: &str = "Store manager";

/// Display name for sessions opened with the viewer access key.
pub const VIEWER_DISPLAY_NAME: &str = "Viewer";

/// Session-stored admin identity.
///
/// Minimal data stored in the session to identify the logged-in admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Admin's display name.
    pub name: String,
    /// Admin's role/permission level.
    pub role: AdminRole,
}

impl CurrentAdmin {
    /// Session for a holder of the given role.
    #[must_use]
    pub fn with_role(role: AdminRole) -> Self {
        let name = match role {
            AdminRole::Viewer => VIEWER_DISPLAY_NAME,
            AdminRole::Admin => ADMIN_DISPLAY_NAME,
        };
        Self {
            name: name.to_string(),
            role,
        }
    }

    /// Whether this admin may download store data.
    #[must_use]
    pub const fn can_export(&self) -> bool {
        self.role.can_export()
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for the anti-forgery token issued to this session.
    pub const CSRF_TOKEN: &str = "csrf_token";
}
