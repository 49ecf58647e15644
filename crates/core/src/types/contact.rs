//! Customer contact records.
//!
//! A [`ContactRecord`] is one row of the Shopify customer import. It is built
//! from a [`BillingFields`] block taken either from a registered account's
//! billing profile or from the latest guest order, then normalized by the
//! name placeholder rule in [`resolve_names`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder first name used when a contact has no name at all.
pub const PLACEHOLDER_FIRST_NAME: &str = "Customer";

/// Placeholder used for whichever name part is missing.
pub const PLACEHOLDER_NAME: &str = "Unknown";

/// Stored WooCommerce billing fields.
///
/// Identical in shape for the `billing_*` user meta of an account and the
/// `_billing_*` post meta of an order. Missing meta rows are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingFields {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    /// State / province code.
    pub state: String,
    /// ISO country code.
    pub country: String,
    pub postcode: String,
    pub phone: String,
}

/// Where a contact was reconciled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    /// A registered WordPress account owns the email.
    Registered,
    /// Only guest orders carry the email.
    Guest,
}

impl ContactSource {
    /// Human-readable label used in the provenance note.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Registered => "registered customer",
            Self::Guest => "guest checkout",
        }
    }

    /// Provenance note stamped on every exported row.
    #[must_use]
    pub fn note(self, exported_on: NaiveDate) -> String {
        format!(
            "Imported from WooCommerce ({}) on {}",
            self.label(),
            exported_on.format("%Y-%m-%d")
        )
    }
}

/// One normalized customer contact, ready for CSV encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub first_name: String,
    pub last_name: String,
    /// Original-case email from the source row.
    pub email: String,
    pub company: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub postal_code: String,
    pub phone: String,
    pub accepts_email_marketing: bool,
    pub accepts_sms_marketing: bool,
    pub tags: String,
    pub note: String,
    pub tax_exempt: bool,
}

impl ContactRecord {
    /// Build a record from a billing block, applying [`resolve_names`].
    ///
    /// Marketing consent and tax exemption are never carried over from
    /// WooCommerce; Shopify requires explicit opt-in.
    #[must_use]
    pub fn from_billing(
        email: impl Into<String>,
        billing: &BillingFields,
        source: ContactSource,
        exported_on: NaiveDate,
    ) -> Self {
        let (first_name, last_name) = resolve_names(&billing.first_name, &billing.last_name);

        Self {
            first_name,
            last_name,
            email: email.into().trim().to_owned(),
            company: billing.company.trim().to_owned(),
            address1: billing.address_1.trim().to_owned(),
            address2: billing.address_2.trim().to_owned(),
            city: billing.city.trim().to_owned(),
            region: billing.state.trim().to_owned(),
            country: billing.country.trim().to_owned(),
            postal_code: billing.postcode.trim().to_owned(),
            phone: billing.phone.trim().to_owned(),
            accepts_email_marketing: false,
            accepts_sms_marketing: false,
            tags: String::new(),
            note: source.note(exported_on),
            tax_exempt: false,
        }
    }
}

/// Apply the name placeholder rule.
///
/// | first | last  | result                    |
/// |-------|-------|---------------------------|
/// | ""    | ""    | ("Customer", "Unknown")   |
/// | ""    | "Doe" | ("Unknown", "Doe")        |
/// | "Jane"| ""    | ("Jane", "Jane")          |
///
/// Whitespace-only names count as empty; present names are trimmed.
#[must_use]
pub fn resolve_names(first: &str, last: &str) -> (String, String) {
    let first = first.trim();
    let last = last.trim();

    match (first.is_empty(), last.is_empty()) {
        (true, true) => (PLACEHOLDER_FIRST_NAME.to_owned(), PLACEHOLDER_NAME.to_owned()),
        (true, false) => (PLACEHOLDER_NAME.to_owned(), last.to_owned()),
        (false, true) => (first.to_owned(), first.to_owned()),
        (false, false) => (first.to_owned(), last.to_owned()),
    }
}
