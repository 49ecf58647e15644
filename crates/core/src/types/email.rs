//! Case-insensitive email key.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`EmailKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input is empty or consists only of whitespace.
    #[error("email cannot be empty")]
    Empty,
}

/// The normalized form of an email address used to deduplicate and order
/// customers.
///
/// WooCommerce stores the same customer under differently-cased addresses
/// (`Jane@Example.com` on one order, `jane@example.com` on the account), so
/// the export keys every contact by the trimmed, lower-cased address. The
/// key never leaves the server as the emitted email; records keep the
/// original spelling from their source row.
///
/// No structural validation is done beyond non-emptiness: a stored billing
/// email that WooCommerce accepted is exported as-is rather than dropped.
///
/// ## Examples
///
/// ```
/// use woo_porter_core::EmailKey;
///
/// let key = EmailKey::parse("  Jane.Doe@Example.COM ").unwrap();
/// assert_eq!(key.as_str(), "jane.doe@example.com");
///
/// assert!(EmailKey::parse("").is_err());
/// assert!(EmailKey::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct EmailKey(String);

impl EmailKey {
    /// Normalize a raw address into a key.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError::Empty`] if the input is blank after trimming.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns `true` if `raw` normalizes to this key.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        raw.trim().to_lowercase() == self.0
    }
}

impl fmt::Display for EmailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EmailKey {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EmailKey {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailKey> for String {
    fn from(key: EmailKey) -> Self {
        key.0
    }
}

impl AsRef<str> for EmailKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lowercases_and_trims() {
        let key = EmailKey::parse(" USER@Example.com\t").unwrap();
        assert_eq!(key.as_str(), "user@example.com");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(EmailKey::parse(""), Err(EmailError::Empty));
        assert_eq!(EmailKey::parse(" \n "), Err(EmailError::Empty));
    }

    #[test]
    fn test_parse_keeps_unstructured_addresses() {
        // Legacy orders sometimes carry junk; it still counts as a contact.
        assert!(EmailKey::parse("no-at-symbol").is_ok());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let key = EmailKey::parse("jane@example.com").unwrap();
        assert!(key.matches("Jane@EXAMPLE.com"));
        assert!(key.matches(" jane@example.com "));
        assert!(!key.matches("john@example.com"));
    }

    #[test]
    fn test_ordering_follows_normalized_form() {
        let mut keys = vec![
            EmailKey::parse("Zed@example.com").unwrap(),
            EmailKey::parse("amy@example.com").unwrap(),
            EmailKey::parse("Bob@example.com").unwrap(),
        ];
        keys.sort();
        let sorted: Vec<&str> = keys.iter().map(EmailKey::as_str).collect();
        assert_eq!(
            sorted,
            ["amy@example.com", "bob@example.com", "zed@example.com"]
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let key = EmailKey::parse("User@Example.com").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"user@example.com\"");

        let parsed: EmailKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, key);
        assert!(serde_json::from_str::<EmailKey>("\"  \"").is_err());
    }
}
