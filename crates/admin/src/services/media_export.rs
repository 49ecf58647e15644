//! Media-library ZIP exports.
//!
//! Three downloads, all built from files under the WordPress uploads
//! directory:
//!
//! - images referenced by `<img src>` in product long descriptions
//! - image attachments no published product uses as featured or gallery image
//! - every PDF attachment
//!
//! Entries are stored under their basename. Missing files are skipped, and
//! when two files share a basename the first one wins.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use woo_porter_core::AttachmentId;

use crate::db::{Attachment, MediaStore, ProductImageRefs, RepositoryError};

pub const PRODUCT_IMAGES_FILENAME: &str = "woocommerce-product-images.zip";
pub const UNUSED_IMAGES_FILENAME: &str = "unused-product-images.zip";
pub const PDFS_FILENAME: &str = "media-library-pdfs.zip";

/// Matches the `src` attribute of an `<img>` tag.
static IMG_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img[^>]+src="([^"]+)""#).expect("Invalid regex"));

/// Errors from the media exports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Nothing to export. The message is shown to the user as-is.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive task failed: {0}")]
    Task(String),
}

/// A finished archive ready to send.
#[derive(Debug)]
pub struct ZipExport {
    pub filename: &'static str,
    pub bytes: Vec<u8>,
    /// Files actually written into the archive.
    pub entries: usize,
}

/// Builds the media ZIP downloads.
#[derive(Clone)]
pub struct MediaExporter {
    store: Arc<dyn MediaStore>,
    uploads_dir: PathBuf,
    uploads_url: String,
}

impl MediaExporter {
    #[must_use]
    pub fn new(store: Arc<dyn MediaStore>, uploads_dir: PathBuf, uploads_url: String) -> Self {
        Self {
            store,
            uploads_dir,
            uploads_url,
        }
    }

    /// Images embedded in product long descriptions.
    ///
    /// # Errors
    ///
    /// `NotFound` when there are no published products or no description
    /// references a local upload.
    #[instrument(skip(self))]
    pub async fn product_description_images(&self) -> Result<ZipExport, ExportError> {
        let descriptions = self.store.list_product_descriptions().await?;
        if descriptions.is_empty() {
            return Err(ExportError::NotFound("No WooCommerce products found."));
        }

        let urls = description_image_urls(
            descriptions.iter().map(|d| d.content.as_str()),
            &self.uploads_url,
        );
        if urls.is_empty() {
            return Err(ExportError::NotFound(
                "No images found in any product descriptions.",
            ));
        }

        let paths = urls
            .iter()
            .filter_map(|url| url_to_upload_path(url, &self.uploads_url, &self.uploads_dir))
            .collect();

        build_zip(PRODUCT_IMAGES_FILENAME, paths).await
    }

    /// Image attachments not used as a product's featured or gallery image.
    ///
    /// # Errors
    ///
    /// `NotFound` when the media library has no images, or all are in use.
    #[instrument(skip(self))]
    pub async fn unused_product_images(&self) -> Result<ZipExport, ExportError> {
        let images = self.store.list_image_attachments().await?;
        if images.is_empty() {
            return Err(ExportError::NotFound("No images found in the Media Library."));
        }

        let refs = self.store.list_product_image_refs().await?;
        let unused = unused_attachments(images, &refs);
        if unused.is_empty() {
            return Err(ExportError::NotFound("No unused images found."));
        }

        build_zip(UNUSED_IMAGES_FILENAME, self.attachment_paths(&unused)).await
    }

    /// Every PDF in the media library.
    ///
    /// # Errors
    ///
    /// `NotFound` when there are no PDF attachments.
    #[instrument(skip(self))]
    pub async fn media_library_pdfs(&self) -> Result<ZipExport, ExportError> {
        let pdfs = self.store.list_pdf_attachments().await?;
        if pdfs.is_empty() {
            return Err(ExportError::NotFound(
                "No PDF files found in the Media Library.",
            ));
        }

        build_zip(PDFS_FILENAME, self.attachment_paths(&pdfs)).await
    }

    fn attachment_paths(&self, attachments: &[Attachment]) -> Vec<PathBuf> {
        attachments
            .iter()
            .filter_map(|a| safe_join(&self.uploads_dir, &a.relative_path))
            .collect()
    }
}

/// Local-upload image URLs in the given HTML, first occurrence order.
pub fn description_image_urls<'a>(
    descriptions: impl IntoIterator<Item = &'a str>,
    uploads_url: &str,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for html in descriptions {
        for capture in IMG_SRC_RE.captures_iter(html) {
            let Some(src) = capture.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if src.contains(uploads_url) && seen.insert(src) {
                urls.push(src.to_string());
            }
        }
    }

    urls
}

/// Attachments that are neither a thumbnail nor in any gallery.
pub fn unused_attachments(images: Vec<Attachment>, refs: &[ProductImageRefs]) -> Vec<Attachment> {
    let used: HashSet<AttachmentId> = refs
        .iter()
        .flat_map(|r| r.thumbnail_id.into_iter().chain(gallery_ids(&r.gallery)))
        .collect();

    images
        .into_iter()
        .filter(|image| !used.contains(&image.id))
        .collect()
}

/// Parse a `_product_image_gallery` value. Non-numeric entries are ignored.
fn gallery_ids(gallery: &str) -> impl Iterator<Item = AttachmentId> + '_ {
    gallery
        .split(',')
        .filter_map(|id| id.trim().parse::<u64>().ok())
        .filter(|&id| id > 0)
        .map(AttachmentId::new)
}

fn url_to_upload_path(url: &str, uploads_url: &str, uploads_dir: &Path) -> Option<PathBuf> {
    let start = url.find(uploads_url)? + uploads_url.len();
    let relative = url.get(start..)?;
    let relative = relative.split(['?', '#']).next().unwrap_or(relative);
    safe_join(uploads_dir, relative.trim_start_matches('/'))
}

/// Join a relative upload path, refusing anything that escapes the base.
fn safe_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if contained && relative.file_name().is_some() {
        Some(base.join(relative))
    } else {
        warn!(path = %relative.display(), "Skipping upload path outside uploads directory");
        None
    }
}

/// Zip the given files off the async runtime.
///
/// # Errors
///
/// Returns `ExportError` if a file cannot be read or the archive cannot be
/// written.
pub async fn build_zip(
    filename: &'static str,
    paths: Vec<PathBuf>,
) -> Result<ZipExport, ExportError> {
    let (bytes, entries) = tokio::task::spawn_blocking(move || write_zip(&paths))
        .await
        .map_err(|e| ExportError::Task(e.to_string()))??;

    info!(filename, entries, size = bytes.len(), "Built media archive");

    Ok(ZipExport {
        filename,
        bytes,
        entries,
    })
}

fn write_zip(paths: &[PathBuf]) -> Result<(Vec<u8>, usize), ExportError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut names = HashSet::new();

    for path in paths {
        if !path.is_file() {
            debug!(path = %path.display(), "Skipping missing file");
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !names.insert(name.clone()) {
            debug!(path = %path.display(), "Skipping duplicate basename");
            continue;
        }

        let contents = std::fs::read(path).map_err(|source| ExportError::Read {
            path: path.clone(),
            source,
        })?;
        zip.start_file(name, options)?;
        zip.write_all(&contents).map_err(zip::result::ZipError::Io)?;
    }

    let entries = names.len();
    let cursor = zip.finish()?;
    Ok((cursor.into_inner(), entries))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;
    use std::io::Read;
    use woo_porter_core::ProductId;

    const UPLOADS_URL: &str = "https://shop.example.com/wp-content/uploads";

    fn read_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    fn setup() -> (tempfile::TempDir, Arc<InMemoryStore>, MediaExporter) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let exporter = MediaExporter::new(
            store.clone(),
            dir.path().to_path_buf(),
            UPLOADS_URL.to_string(),
        );
        (dir, store, exporter)
    }

    fn touch(dir: &Path, relative: &str, contents: &[u8]) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_description_urls_filtered_and_deduplicated() {
        let html = [
            r#"<p><img class="a" src="https://shop.example.com/wp-content/uploads/2024/01/a.jpg"></p>"#,
            r#"<img src="https://cdn.other.com/b.jpg"><img alt="x" src="https://shop.example.com/wp-content/uploads/2024/01/a.jpg">"#,
            r#"<img src="https://shop.example.com/wp-content/uploads/c.png" />"#,
        ];

        let urls = description_image_urls(html, UPLOADS_URL);

        assert_eq!(
            urls,
            [
                "https://shop.example.com/wp-content/uploads/2024/01/a.jpg",
                "https://shop.example.com/wp-content/uploads/c.png",
            ]
        );
    }

    #[test]
    fn test_unused_excludes_thumbnails_and_gallery() {
        let images: Vec<Attachment> = (1..=5)
            .map(|id| Attachment {
                id: AttachmentId::new(id),
                relative_path: format!("{id}.jpg"),
            })
            .collect();
        let refs = [ProductImageRefs {
            product_id: ProductId::new(100),
            thumbnail_id: Some(AttachmentId::new(1)),
            gallery: "2, 4,junk,".to_string(),
        }];

        let unused = unused_attachments(images, &refs);

        let ids: Vec<u64> = unused.iter().map(|a| a.id.as_u64()).collect();
        assert_eq!(ids, [3, 5]);
    }

    #[test]
    fn test_safe_join_rejects_traversal() {
        let base = Path::new("/srv/uploads");
        assert_eq!(
            safe_join(base, "2024/01/a.pdf"),
            Some(PathBuf::from("/srv/uploads/2024/01/a.pdf"))
        );
        assert_eq!(safe_join(base, "../wp-config.php"), None);
        assert_eq!(safe_join(base, "/etc/passwd"), None);
    }

    #[test]
    fn test_url_to_upload_path_strips_query() {
        let path = url_to_upload_path(
            "https://shop.example.com/wp-content/uploads/2024/01/a.jpg?v=2",
            UPLOADS_URL,
            Path::new("/srv/uploads"),
        );
        assert_eq!(path, Some(PathBuf::from("/srv/uploads/2024/01/a.jpg")));
    }

    #[tokio::test]
    async fn test_product_images_zip_skips_missing_and_duplicate_basenames() {
        let (dir, store, exporter) = setup();
        touch(dir.path(), "2024/01/a.jpg", b"first");
        touch(dir.path(), "2024/02/a.jpg", b"second");
        touch(dir.path(), "2024/02/b.jpg", b"bee");
        store.add_product(
            ProductId::new(1),
            &format!(
                r#"<img src="{UPLOADS_URL}/2024/01/a.jpg"><img src="{UPLOADS_URL}/2024/02/a.jpg"><img src="{UPLOADS_URL}/gone.jpg"><img src="{UPLOADS_URL}/2024/02/b.jpg">"#
            ),
            None,
            "",
        );

        let export = exporter.product_description_images().await.unwrap();

        assert_eq!(export.filename, PRODUCT_IMAGES_FILENAME);
        assert_eq!(export.entries, 2);
        assert_eq!(read_names(&export.bytes), ["a.jpg", "b.jpg"]);

        let mut archive = zip::ZipArchive::new(Cursor::new(&export.bytes)).unwrap();
        let mut contents = String::new();
        archive
            .by_name("a.jpg")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "first");
    }

    #[tokio::test]
    async fn test_product_images_not_found_messages() {
        let (_dir, store, exporter) = setup();

        let err = exporter.product_description_images().await.unwrap_err();
        assert_eq!(err.to_string(), "No WooCommerce products found.");

        store.add_product(ProductId::new(1), "<p>No pictures here</p>", None, "");
        let err = exporter.product_description_images().await.unwrap_err();
        assert_eq!(err.to_string(), "No images found in any product descriptions.");
    }

    #[tokio::test]
    async fn test_unused_images_zip() {
        let (dir, store, exporter) = setup();
        touch(dir.path(), "used.jpg", b"u");
        touch(dir.path(), "spare.jpg", b"s");
        store.add_attachment(AttachmentId::new(1), "used.jpg", "image/jpeg");
        store.add_attachment(AttachmentId::new(2), "spare.jpg", "image/jpeg");
        store.add_attachment(AttachmentId::new(3), "doc.pdf", "application/pdf");
        store.add_product(ProductId::new(10), "", Some(AttachmentId::new(1)), "");

        let export = exporter.unused_product_images().await.unwrap();

        assert_eq!(export.filename, UNUSED_IMAGES_FILENAME);
        assert_eq!(read_names(&export.bytes), ["spare.jpg"]);
    }

    #[tokio::test]
    async fn test_unused_images_when_all_used() {
        let (_dir, store, exporter) = setup();

        let err = exporter.unused_product_images().await.unwrap_err();
        assert_eq!(err.to_string(), "No images found in the Media Library.");

        store.add_attachment(AttachmentId::new(1), "a.jpg", "image/png");
        store.add_product(ProductId::new(10), "", None, "1");
        let err = exporter.unused_product_images().await.unwrap_err();
        assert_eq!(err.to_string(), "No unused images found.");
    }

    #[tokio::test]
    async fn test_pdf_export() {
        let (dir, store, exporter) = setup();

        let err = exporter.media_library_pdfs().await.unwrap_err();
        assert_eq!(err.to_string(), "No PDF files found in the Media Library.");

        touch(dir.path(), "2023/05/manual.pdf", b"%PDF-1.4");
        store.add_attachment(AttachmentId::new(7), "2023/05/manual.pdf", "application/pdf");
        store.add_attachment(AttachmentId::new(8), "2023/05/lost.pdf", "application/pdf");

        let export = exporter.media_library_pdfs().await.unwrap();

        assert_eq!(export.filename, PDFS_FILENAME);
        assert_eq!(export.entries, 1);
        assert_eq!(read_names(&export.bytes), ["manual.pdf"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (_dir, store, exporter) = setup();
        store.set_failing(true);

        let err = exporter.media_library_pdfs().await.unwrap_err();
        assert!(matches!(err, ExportError::Repository(_)));
    }
}
