//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Router, routing::get};
use tracing::instrument;

use crate::{middleware::auth::RequireAdminAuth, models::CurrentAdmin, state::AppState};

use super::{ExportPage, MENU};

/// Admin user view for templates.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub role: String,
    pub can_export: bool,
}

impl From<&CurrentAdmin> for AdminUserView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            name: admin.name.clone(),
            role: admin.role.to_string(),
            can_export: admin.can_export(),
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub menu: Vec<ExportPage>,
}

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

/// Dashboard page handler.
///
/// Viewers see the panel without the export menu.
#[instrument(skip_all)]
async fn dashboard(RequireAdminAuth(admin): RequireAdminAuth) -> DashboardTemplate {
    let menu = if admin.can_export() {
        MENU.to_vec()
    } else {
        Vec::new()
    };

    DashboardTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/".to_string(),
        menu,
    }
}
