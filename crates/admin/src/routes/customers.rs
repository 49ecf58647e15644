//! Shopify customer CSV export routes.
//!
//! Two ways to download the same file: one request that builds every page
//! on the server, or a browser-driven loop over the batch API for stores
//! too large to export within one request.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_sessions::Session;
use tracing::instrument;

use woo_porter_core::shopify_csv;

use crate::{
    error::AppError,
    middleware::{
        RequireExportCapability,
        csrf::{issue_token, require_token},
    },
    models::CurrentAdmin,
    state::{AppState, today},
};

use super::dashboard::AdminUserView;
use super::media::ExportForm;
use super::{CUSTOMERS_BATCHED_PAGE, CUSTOMERS_PAGE, ExportPage};

/// Path of the batch API the browser driver calls.
pub const BATCH_ENDPOINT: &str = "/api/exports/customers/batch";

/// Separator for the column names handed to the browser driver.
pub const HEADER_SEPARATOR: &str = "|";

/// Single-request export page.
#[derive(Template, WebTemplate)]
#[template(path = "exports/customers.html")]
pub struct CustomersExportTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub page: ExportPage,
    pub batched_page: ExportPage,
    pub csrf_token: String,
}

/// Browser-driven batched export page.
#[derive(Template, WebTemplate)]
#[template(path = "exports/customers_batched.html")]
pub struct CustomersBatchedTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub page: ExportPage,
    pub csrf_token: String,
    pub batch_endpoint: String,
    pub batch_size: u32,
    pub filename: String,
    /// `HEADERS` joined with [`HEADER_SEPARATOR`]; the script writes them verbatim.
    pub csv_headers: String,
}

/// Build the customer export router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(CUSTOMERS_PAGE.path, get(customers_page).post(download_csv))
        .route(CUSTOMERS_BATCHED_PAGE.path, get(batched_page))
}

async fn session_token(session: &Session) -> Result<String, AppError> {
    issue_token(session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))
}

/// GET /exports/customers
async fn customers_page(
    RequireExportCapability(admin): RequireExportCapability,
    session: Session,
) -> Result<CustomersExportTemplate, AppError> {
    Ok(CustomersExportTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: CUSTOMERS_PAGE.path.to_string(),
        page: CUSTOMERS_PAGE,
        batched_page: CUSTOMERS_BATCHED_PAGE,
        csrf_token: session_token(&session).await?,
    })
}

/// GET /exports/customers/batched
async fn batched_page(
    RequireExportCapability(admin): RequireExportCapability,
    State(state): State<AppState>,
    session: Session,
) -> Result<CustomersBatchedTemplate, AppError> {
    Ok(batched_template(
        &admin,
        session_token(&session).await?,
        state.config().batch_size,
    ))
}

fn batched_template(
    admin: &CurrentAdmin,
    csrf_token: String,
    batch_size: u32,
) -> CustomersBatchedTemplate {
    CustomersBatchedTemplate {
        admin_user: AdminUserView::from(admin),
        current_path: CUSTOMERS_BATCHED_PAGE.path.to_string(),
        page: CUSTOMERS_BATCHED_PAGE,
        csrf_token,
        batch_endpoint: BATCH_ENDPOINT.to_string(),
        batch_size,
        filename: shopify_csv::export_filename(today()),
        csv_headers: shopify_csv::HEADERS.join(HEADER_SEPARATOR),
    }
}

/// Build the whole CSV in one request.
///
/// POST /exports/customers
#[instrument(skip_all)]
async fn download_csv(
    RequireExportCapability(_admin): RequireExportCapability,
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ExportForm>,
) -> Result<Response, AppError> {
    require_token(&session, &headers, form.csrf_token.as_deref()).await?;

    let rows = state
        .customer_exporter()
        .export_all(state.config().batch_size)
        .await?;
    let bytes = shopify_csv::encode(&rows)?;
    let filename = shopify_csv::export_filename(today());

    tracing::info!(rows = rows.len(), filename = %filename, "Customer CSV exported");

    Ok(csv_download(&filename, bytes))
}

/// Turn encoded CSV into a download.
pub fn csv_download(filename: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{filename}\"");
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use woo_porter_core::AdminRole;

    const DRIVER_SCRIPT: &str = include_str!("../../static/js/customer-export.js");

    #[test]
    fn test_batched_page_hands_csv_headers_to_script() {
        let template = batched_template(
            &CurrentAdmin::with_role(AdminRole::Admin),
            "token".to_string(),
            100,
        );
        let headers: Vec<&str> = template.csv_headers.split(HEADER_SEPARATOR).collect();

        assert_eq!(headers, shopify_csv::HEADERS);
        assert!(
            shopify_csv::HEADERS
                .iter()
                .all(|name| !name.contains(HEADER_SEPARATOR))
        );
    }

    #[test]
    fn test_driver_script_reads_headers_from_page() {
        assert!(DRIVER_SCRIPT.contains("dataset.headers"));
        assert!(DRIVER_SCRIPT.contains(&format!("split('{HEADER_SEPARATOR}')")));
        for name in shopify_csv::HEADERS {
            assert!(
                !DRIVER_SCRIPT.contains(&format!("'{name}'")),
                "script hardcodes column {name}"
            );
        }
    }
}
