//! Customer reconciliation and batched export.
//!
//! Merges registered accounts and guest order billing records into one
//! contact per unique email, delivered in deterministic fixed-size pages:
//!
//! 1. Candidate set = distinct lower-cased emails from visible orders and
//!    registered accounts, sorted ascending.
//! 2. The page is the slice `[offset, offset + batch_size)` of that set.
//! 3. Each email resolves to the account that owns it, or else to the most
//!    recent order billed to it.
//!
//! The exporter holds no state between pages. Paging is stable only because
//! every call rebuilds and sorts the candidate set the same way; rows added
//! or removed mid-export may shift later pages.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use woo_porter_core::{
    BatchResult, BillingFields, ContactRecord, ContactSource, EmailKey, TotalCount,
};

use crate::db::{CustomerStore, RegisteredCustomer, RepositoryError};

/// Builds export pages from a [`CustomerStore`].
#[derive(Clone)]
pub struct CustomerExporter {
    store: Arc<dyn CustomerStore>,
    exported_on: NaiveDate,
}

impl CustomerExporter {
    /// Create an exporter stamping rows with `exported_on`.
    #[must_use]
    pub fn new(store: Arc<dyn CustomerStore>, exported_on: NaiveDate) -> Self {
        Self { store, exported_on }
    }

    /// Build one page of contacts.
    ///
    /// `total_count` is only computed when `offset == 0`; later pages report
    /// [`TotalCount::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if any query fails. A failed page returns no
    /// rows at all.
    #[instrument(skip(self))]
    pub async fn fetch_batch(
        &self,
        offset: u64,
        batch_size: u32,
    ) -> Result<BatchResult, RepositoryError> {
        let candidates = self.candidate_emails().await?;

        let total_count = if offset == 0 {
            TotalCount::Known(candidates.len() as u64)
        } else {
            TotalCount::Unknown
        };

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let page: Vec<EmailKey> = candidates
            .into_iter()
            .skip(skip)
            .take(batch_size as usize)
            .collect();

        let mut rows = Vec::with_capacity(page.len());
        for email in &page {
            rows.push(self.resolve_contact(email).await?);
        }

        let new_offset = offset + rows.len() as u64;
        let completed = rows.len() < batch_size as usize;

        info!(
            offset,
            rows = rows.len(),
            new_offset,
            completed,
            "Built customer export page"
        );

        Ok(BatchResult {
            rows,
            new_offset,
            total_count,
            completed,
        })
    }

    /// Build every page in one call, for the single-request export.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if any page fails.
    #[instrument(skip(self))]
    pub async fn export_all(&self, batch_size: u32) -> Result<Vec<ContactRecord>, RepositoryError> {
        let mut rows = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_batch(offset, batch_size).await?;
            offset = page.new_offset;
            rows.extend(page.rows);
            if page.completed {
                break;
            }
        }

        Ok(rows)
    }

    /// Distinct, normalized, sorted emails from orders and accounts.
    async fn candidate_emails(&self) -> Result<BTreeSet<EmailKey>, RepositoryError> {
        let billing = self.store.list_distinct_billing_emails().await?;
        let users = self.store.list_user_emails().await?;

        let candidates: BTreeSet<EmailKey> = billing
            .iter()
            .chain(users.iter())
            .filter_map(|raw| EmailKey::parse(raw).ok())
            .collect();

        debug!(
            billing_emails = billing.len(),
            user_emails = users.len(),
            unique = candidates.len(),
            "Collected candidate emails"
        );

        Ok(candidates)
    }

    /// Resolve one email, preferring the registered account.
    async fn resolve_contact(&self, email: &EmailKey) -> Result<ContactRecord, RepositoryError> {
        if let Some(customer) = self.store.find_user_by_email(email.as_str()).await? {
            return Ok(registered_contact(&customer, self.exported_on));
        }

        let record = match self
            .store
            .find_latest_order_by_billing_email(email.as_str())
            .await?
        {
            Some(order) => ContactRecord::from_billing(
                order.billing_email,
                &order.billing,
                ContactSource::Guest,
                self.exported_on,
            ),
            None => ContactRecord::from_billing(
                email.as_str(),
                &BillingFields::default(),
                ContactSource::Guest,
                self.exported_on,
            ),
        };

        Ok(record)
    }
}

/// Billing profile with names falling back to the account profile.
fn registered_contact(customer: &RegisteredCustomer, exported_on: NaiveDate) -> ContactRecord {
    let mut billing = customer.billing.clone();
    if billing.first_name.trim().is_empty() {
        billing.first_name.clone_from(&customer.profile_first_name);
    }
    if billing.last_name.trim().is_empty() {
        billing.last_name.clone_from(&customer.profile_last_name);
    }

    ContactRecord::from_billing(
        customer.email.as_str(),
        &billing,
        ContactSource::Registered,
        exported_on,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryStore, named, order, registered};
    use chrono::NaiveDateTime;
    use woo_porter_core::BillingFields;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn exporter(store: &Arc<InMemoryStore>) -> CustomerExporter {
        CustomerExporter::new(store.clone(), today())
    }

    #[tokio::test]
    async fn test_registered_user_preferred_over_guest_orders() {
        let store = Arc::new(InMemoryStore::new());
        store.add_user(registered(1, "Jane@Example.com", named("Jane", "Doe")));
        store.add_order(order(10, "jane@example.com", named("Guest", "Name"), at(5)));

        let page = exporter(&store).fetch_batch(0, 10).await.unwrap();

        assert_eq!(page.rows.len(), 1);
        let row = &page.rows[0];
        assert_eq!(row.email, "Jane@Example.com");
        assert_eq!(row.first_name, "Jane");
        assert!(row.note.contains("registered customer"));
    }

    #[tokio::test]
    async fn test_registered_names_fall_back_to_profile() {
        let store = Arc::new(InMemoryStore::new());
        let mut customer = registered(
            1,
            "pat@example.com",
            BillingFields {
                city: "Springfield".to_string(),
                ..BillingFields::default()
            },
        );
        customer.profile_first_name = "Pat".to_string();
        customer.profile_last_name = "Smith".to_string();
        store.add_user(customer);

        let page = exporter(&store).fetch_batch(0, 10).await.unwrap();

        let row = &page.rows[0];
        assert_eq!((row.first_name.as_str(), row.last_name.as_str()), ("Pat", "Smith"));
        assert_eq!(row.city, "Springfield");
    }

    #[tokio::test]
    async fn test_billing_names_win_over_profile() {
        let store = Arc::new(InMemoryStore::new());
        let mut customer = registered(1, "pat@example.com", named("Patricia", ""));
        customer.profile_first_name = "Pat".to_string();
        customer.profile_last_name = "Smith".to_string();
        store.add_user(customer);

        let page = exporter(&store).fetch_batch(0, 10).await.unwrap();

        let row = &page.rows[0];
        assert_eq!(row.first_name, "Patricia");
        assert_eq!(row.last_name, "Smith");
    }

    #[tokio::test]
    async fn test_guest_uses_latest_order() {
        let store = Arc::new(InMemoryStore::new());
        store.add_order(order(1, "guest@example.com", named("Old", "Name"), at(1)));
        store.add_order(order(2, "GUEST@example.com", named("New", "Name"), at(20)));

        let page = exporter(&store).fetch_batch(0, 10).await.unwrap();

        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].first_name, "New");
        assert_eq!(page.rows[0].email, "GUEST@example.com");
        assert!(page.rows[0].note.contains("guest checkout"));
    }

    #[tokio::test]
    async fn test_draft_and_trashed_orders_are_ignored() {
        let store = Arc::new(InMemoryStore::new());
        let mut draft = order(1, "draft@example.com", named("D", "D"), at(1));
        draft.status = "draft".to_string();
        let mut trashed = order(2, "trash@example.com", named("T", "T"), at(1));
        trashed.status = "trash".to_string();
        store.add_order(draft);
        store.add_order(trashed);
        store.add_order(order(3, "real@example.com", named("R", "R"), at(1)));

        let page = exporter(&store).fetch_batch(0, 10).await.unwrap();

        let emails: Vec<&str> = page.rows.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, ["real@example.com"]);
        assert_eq!(page.total_count, TotalCount::Known(1));
    }

    #[tokio::test]
    async fn test_pages_partition_sorted_candidates() {
        let store = Arc::new(InMemoryStore::new());
        for (i, email) in ["d@x.io", "B@x.io", "a@x.io", "c@x.io", "e@x.io"]
            .iter()
            .enumerate()
        {
            store.add_order(order(i as u64 + 1, email, named("N", "N"), at(1)));
        }
        let exporter = exporter(&store);

        let first = exporter.fetch_batch(0, 2).await.unwrap();
        let second = exporter.fetch_batch(first.new_offset, 2).await.unwrap();
        let third = exporter.fetch_batch(second.new_offset, 2).await.unwrap();

        let emails: Vec<String> = [&first, &second, &third]
            .iter()
            .flat_map(|p| p.rows.iter().map(|r| r.email.to_lowercase()))
            .collect();
        assert_eq!(emails, ["a@x.io", "b@x.io", "c@x.io", "d@x.io", "e@x.io"]);

        assert_eq!(first.total_count, TotalCount::Known(5));
        assert_eq!(second.total_count, TotalCount::Unknown);
        assert_eq!(
            (first.new_offset, second.new_offset, third.new_offset),
            (2, 4, 5)
        );
        assert_eq!(
            (first.completed, second.completed, third.completed),
            (false, false, true)
        );
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_trailing_empty_page() {
        let store = Arc::new(InMemoryStore::new());
        store.add_order(order(1, "a@x.io", named("A", "A"), at(1)));
        store.add_order(order(2, "b@x.io", named("B", "B"), at(1)));
        let exporter = exporter(&store);

        let first = exporter.fetch_batch(0, 2).await.unwrap();
        assert!(!first.completed);

        let last = exporter.fetch_batch(first.new_offset, 2).await.unwrap();
        assert!(last.rows.is_empty());
        assert!(last.completed);
        assert_eq!(last.new_offset, 2);
    }

    #[tokio::test]
    async fn test_offset_past_end_is_completed_and_empty() {
        let store = Arc::new(InMemoryStore::new());
        store.add_order(order(1, "a@x.io", named("A", "A"), at(1)));

        let page = exporter(&store).fetch_batch(50, 10).await.unwrap();

        assert!(page.rows.is_empty());
        assert!(page.completed);
        assert_eq!(page.new_offset, 50);
    }

    #[tokio::test]
    async fn test_store_failure_fails_whole_page() {
        let store = Arc::new(InMemoryStore::new());
        store.add_order(order(1, "a@x.io", named("A", "A"), at(1)));
        store.set_failing(true);

        let result = exporter(&store).fetch_batch(0, 10).await;

        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_export_all_collects_every_page() {
        let store = Arc::new(InMemoryStore::new());
        for i in 0..7_u64 {
            store.add_order(order(i + 1, &format!("user{i}@x.io"), named("N", ""), at(1)));
        }

        let rows = exporter(&store).export_all(3).await.unwrap();

        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.first_name == "N" && r.last_name == "N"));
    }
}
