//! Media-library ZIP export routes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::{
    error::AppError,
    middleware::{
        RequireExportCapability,
        csrf::{issue_token, require_token},
    },
    services::ZipExport,
    state::AppState,
};

use super::dashboard::AdminUserView;
use super::{ExportPage, PDFS_PAGE, PRODUCT_IMAGES_PAGE, UNUSED_IMAGES_PAGE};

/// Export page with a single download button.
#[derive(Template, WebTemplate)]
#[template(path = "exports/media.html")]
pub struct MediaExportTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub page: ExportPage,
    pub csrf_token: String,
}

/// Body of every export form.
#[derive(Debug, Default, Deserialize)]
pub struct ExportForm {
    #[serde(default)]
    pub csrf_token: Option<String>,
}

/// Build the media export router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            PRODUCT_IMAGES_PAGE.path,
            get(product_images_page).post(product_images),
        )
        .route(
            UNUSED_IMAGES_PAGE.path,
            get(unused_images_page).post(unused_images),
        )
        .route(PDFS_PAGE.path, get(pdfs_page).post(pdfs))
}

/// Render an export page, issuing the session's CSRF token.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session store fails.
pub async fn render_page(
    admin: &crate::models::CurrentAdmin,
    session: &Session,
    page: ExportPage,
) -> Result<MediaExportTemplate, AppError> {
    let csrf_token = issue_token(session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(MediaExportTemplate {
        admin_user: AdminUserView::from(admin),
        current_path: page.path.to_string(),
        page,
        csrf_token,
    })
}

/// Turn a finished archive into a download.
pub fn zip_download(export: ZipExport) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        export.bytes,
    )
        .into_response()
}

async fn product_images_page(
    RequireExportCapability(admin): RequireExportCapability,
    session: Session,
) -> Result<MediaExportTemplate, AppError> {
    render_page(&admin, &session, PRODUCT_IMAGES_PAGE).await
}

async fn unused_images_page(
    RequireExportCapability(admin): RequireExportCapability,
    session: Session,
) -> Result<MediaExportTemplate, AppError> {
    render_page(&admin, &session, UNUSED_IMAGES_PAGE).await
}

async fn pdfs_page(
    RequireExportCapability(admin): RequireExportCapability,
    session: Session,
) -> Result<MediaExportTemplate, AppError> {
    render_page(&admin, &session, PDFS_PAGE).await
}

/// POST /exports/product-images
#[instrument(skip_all)]
async fn product_images(
    RequireExportCapability(_admin): RequireExportCapability,
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ExportForm>,
) -> Result<Response, AppError> {
    require_token(&session, &headers, form.csrf_token.as_deref()).await?;
    let export = state.media_exporter().product_description_images().await?;
    Ok(zip_download(export))
}

/// POST /exports/unused-images
#[instrument(skip_all)]
async fn unused_images(
    RequireExportCapability(_admin): RequireExportCapability,
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ExportForm>,
) -> Result<Response, AppError> {
    require_token(&session, &headers, form.csrf_token.as_deref()).await?;
    let export = state.media_exporter().unused_product_images().await?;
    Ok(zip_download(export))
}

/// POST /exports/pdfs
#[instrument(skip_all)]
async fn pdfs(
    RequireExportCapability(_admin): RequireExportCapability,
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ExportForm>,
) -> Result<Response, AppError> {
    require_token(&session, &headers, form.csrf_token.as_deref()).await?;
    let export = state.media_exporter().media_library_pdfs().await?;
    Ok(zip_download(export))
}
