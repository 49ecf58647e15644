//! Export commands.
//!
//! # Usage
//!
//! ```bash
//! WPX_ACCESS_KEY=... wpx export customers --base-url https://admin.example.com
//! ```

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use woo_porter_core::shopify_csv::{self, CsvError};

use crate::client::{HttpBatchClient, TransportError};
use crate::driver::{DriverError, ExportDriver};

/// Errors from the export commands.
#[derive(Debug, Error)]
pub enum ExportCommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Arguments of `wpx export customers`.
pub struct CustomerExportArgs {
    pub base_url: String,
    pub access_key: SecretString,
    pub output: Option<PathBuf>,
    pub cooldown: Duration,
}

/// Run the batched customer export and write the CSV.
///
/// Nothing is written unless every page succeeded.
///
/// # Errors
///
/// Returns `ExportCommandError` if signing in, any page, encoding, or
/// writing the file fails.
pub async fn customers(args: CustomerExportArgs) -> Result<PathBuf, ExportCommandError> {
    let client = HttpBatchClient::connect(&args.base_url, &args.access_key).await?;
    let mut driver = ExportDriver::new(client, args.cooldown);
    let outcome = driver.run().await?;

    let path = args.output.unwrap_or_else(|| {
        PathBuf::from(shopify_csv::export_filename(chrono::Utc::now().date_naive()))
    });
    write_csv(&path, &outcome.rows).await?;

    tracing::info!(
        path = %path.display(),
        rows = outcome.rows.len(),
        pages = outcome.pages,
        "Customer CSV written"
    );
    Ok(path)
}

async fn write_csv(
    path: &std::path::Path,
    rows: &[woo_porter_core::ContactRecord],
) -> Result<(), ExportCommandError> {
    let bytes = shopify_csv::encode(rows)?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| ExportCommandError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use woo_porter_core::ContactRecord;

    #[tokio::test]
    async fn test_write_csv_starts_with_bom_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        let rows = vec![ContactRecord {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..ContactRecord::default()
        }];

        write_csv(&path, &rows).await.unwrap();

        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(shopify_csv::UTF8_BOM));
        let text = String::from_utf8(written).unwrap();
        assert!(text.contains("\"First Name\""));
        assert!(text.contains("\"ada@example.com\""));
        assert!(!text.ends_with('\n'));
    }
}
