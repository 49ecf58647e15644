//! Shopify customer CSV encoding.
//!
//! Output layout:
//! - UTF-8 byte-order mark (spreadsheet tools need it to detect UTF-8)
//! - fixed 16-column header
//! - every field double-quoted, embedded quotes doubled
//! - records joined with `\n`, no trailing newline

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::ContactRecord;

/// UTF-8 byte-order mark.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column headers expected by the Shopify customer import.
pub const HEADERS: [&str; 16] = [
    "First Name",
    "Last Name",
    "Email",
    "Accepts Email Marketing",
    "Company",
    "Address1",
    "Address2",
    "City",
    "Province Code",
    "Country Code",
    "Zip",
    "Phone",
    "Accepts SMS Marketing",
    "Tags",
    "Note",
    "Tax Exempt",
];

/// Errors that can occur while encoding the CSV.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("csv write failed: {0}")]
    Write(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Flush(String),
}

/// Download filename stamped with the export date.
#[must_use]
pub fn export_filename(exported_on: NaiveDate) -> String {
    format!("woocommerce-customers-{}.csv", exported_on.format("%Y-%m-%d"))
}

const fn flag(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// Fields of a record in [`HEADERS`] order.
#[must_use]
pub fn record_fields(record: &ContactRecord) -> [&str; 16] {
    [
        record.first_name.as_str(),
        record.last_name.as_str(),
        record.email.as_str(),
        flag(record.accepts_email_marketing),
        record.company.as_str(),
        record.address1.as_str(),
        record.address2.as_str(),
        record.city.as_str(),
        record.region.as_str(),
        record.country.as_str(),
        record.postal_code.as_str(),
        record.phone.as_str(),
        flag(record.accepts_sms_marketing),
        record.tags.as_str(),
        record.note.as_str(),
        flag(record.tax_exempt),
    ]
}

/// Encode the header and all records.
///
/// # Errors
///
/// Returns `CsvError` if the writer fails, which only happens on an
/// allocation failure for the in-memory buffer.
pub fn encode(records: &[ContactRecord]) -> Result<Vec<u8>, CsvError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.to_vec());

    writer.write_record(HEADERS)?;
    for record in records {
        writer.write_record(record_fields(record))?;
    }

    let mut bytes = writer
        .into_inner()
        .map_err(|e| CsvError::Flush(e.error().to_string()))?;

    // Records are newline-joined, not newline-terminated.
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }

    Ok(bytes)
}
