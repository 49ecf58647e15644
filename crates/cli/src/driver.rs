//! Client side of the resumable customer export.
//!
//! Requests pages strictly in sequence, one in flight at a time, starting at
//! offset 0 and following the server's `newOffset`. Rows accumulate in memory
//! until a page reports `completed`.
//!
//! ```text
//! Idle --run()--> Running --completed--> Completed
//!                    |
//!                    +--failure/transport error--> Failed
//! ```
//!
//! A failed run is not retried; start a new driver to export again.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use woo_porter_core::{BatchResponse, ContactRecord, TotalCount};

use crate::client::TransportError;

/// Fetches one page of the export.
#[async_trait]
pub trait BatchClient: Send + Sync {
    async fn fetch_batch(&self, offset: u64) -> Result<BatchResponse, TransportError>;
}

/// Where the driver is in its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running { offset: u64 },
    Completed { rows: usize },
    Failed { message: String },
}

/// Why a run failed.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server reported a failed page.
    #[error("server reported failure at offset {offset}: {message}")]
    Server { offset: u64, message: String },

    /// A page neither completed nor moved the offset forward.
    #[error("export stalled at offset {offset}")]
    Stalled { offset: u64 },

    /// `run` was called on a driver that already ran.
    #[error("driver already ran (state: {0:?})")]
    AlreadyRan(DriverState),
}

/// Rows and bookkeeping of a finished run.
#[derive(Debug)]
pub struct ExportOutcome {
    pub rows: Vec<ContactRecord>,
    pub total_count: TotalCount,
    pub pages: u32,
}

/// Sequential page driver.
pub struct ExportDriver<C> {
    client: C,
    cooldown: Duration,
    state: DriverState,
    total_count: TotalCount,
}

impl<C: BatchClient> ExportDriver<C> {
    /// Create a driver that pauses `cooldown` between pages.
    pub const fn new(client: C, cooldown: Duration) -> Self {
        Self {
            client,
            cooldown,
            state: DriverState::Idle,
            total_count: TotalCount::Unknown,
        }
    }

    pub const fn state(&self) -> &DriverState {
        &self.state
    }

    /// Total captured from the first page, if the server sent one.
    pub const fn total_count(&self) -> TotalCount {
        self.total_count
    }

    /// Run the export to completion.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` on transport failure, a server-reported failure,
    /// or a page that does not advance. The state is then `Failed`.
    pub async fn run(&mut self) -> Result<ExportOutcome, DriverError> {
        if self.state != DriverState::Idle {
            return Err(DriverError::AlreadyRan(self.state.clone()));
        }

        match self.pump().await {
            Ok(outcome) => {
                self.state = DriverState::Completed {
                    rows: outcome.rows.len(),
                };
                info!(
                    rows = outcome.rows.len(),
                    pages = outcome.pages,
                    "Export completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Export failed");
                self.state = DriverState::Failed {
                    message: e.to_string(),
                };
                Err(e)
            }
        }
    }

    async fn pump(&mut self) -> Result<ExportOutcome, DriverError> {
        let mut rows = Vec::new();
        let mut offset = 0;
        let mut pages = 0;

        loop {
            self.state = DriverState::Running { offset };

            let page = match self.client.fetch_batch(offset).await? {
                BatchResponse::Success(page) => page,
                BatchResponse::Failure { message } => {
                    return Err(DriverError::Server { offset, message });
                }
            };
            pages += 1;

            // Only the first page carries the total; later sentinels keep it.
            self.total_count = self.total_count.or(page.total_count);

            let received = page.rows.len();
            rows.extend(page.rows);

            info!(
                offset,
                received,
                new_offset = page.new_offset,
                progress = %progress(page.new_offset, self.total_count),
                "Received page"
            );

            if page.completed {
                return Ok(ExportOutcome {
                    rows,
                    total_count: self.total_count,
                    pages,
                });
            }

            if page.new_offset <= offset {
                return Err(DriverError::Stalled { offset });
            }
            offset = page.new_offset;

            if !self.cooldown.is_zero() {
                tokio::time::sleep(self.cooldown).await;
            }
        }
    }
}

/// `done/total (pct%)`, or just `done` when the total is unknown.
fn progress(done: u64, total: TotalCount) -> String {
    match total.known() {
        Some(total) if total > 0 => {
            let pct = done.saturating_mul(100) / total;
            format!("{done}/{total} ({}%)", pct.min(100))
        }
        _ => done.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use woo_porter_core::BatchResult;

    /// Replays canned responses and records requested offsets.
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<BatchResponse, TransportError>>>,
        offsets: Mutex<Vec<u64>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<BatchResponse, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<u64> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<'a> BatchClient for &'a ScriptedClient {
        async fn fetch_batch(&self, offset: u64) -> Result<BatchResponse, TransportError> {
            self.offsets.lock().unwrap().push(offset);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Unexpected("script exhausted".into())))
        }
    }

    fn contact(email: &str) -> ContactRecord {
        ContactRecord {
            email: email.to_string(),
            ..ContactRecord::default()
        }
    }

    fn page(
        emails: &[&str],
        new_offset: u64,
        total_count: TotalCount,
        completed: bool,
    ) -> Result<BatchResponse, TransportError> {
        Ok(BatchResponse::Success(BatchResult {
            rows: emails.iter().map(|e| contact(e)).collect(),
            new_offset,
            total_count,
            completed,
        }))
    }

    #[tokio::test]
    async fn test_runs_until_completed() {
        let client = ScriptedClient::new(vec![
            page(&["a@x.io", "b@x.io"], 2, TotalCount::Known(5), false),
            page(&["c@x.io", "d@x.io"], 4, TotalCount::Unknown, false),
            page(&["e@x.io"], 5, TotalCount::Unknown, true),
        ]);
        let mut driver = ExportDriver::new(&client, Duration::ZERO);

        let outcome = driver.run().await.unwrap();

        assert_eq!(client.offsets(), [0, 2, 4]);
        assert_eq!(outcome.rows.len(), 5);
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.total_count, TotalCount::Known(5));
        assert_eq!(driver.state(), &DriverState::Completed { rows: 5 });
    }

    #[tokio::test]
    async fn test_sentinel_total_does_not_overwrite_first() {
        let client = ScriptedClient::new(vec![
            page(&["a@x.io"], 1, TotalCount::Known(2), false),
            page(&["b@x.io"], 2, TotalCount::Unknown, false),
            page(&[], 2, TotalCount::Unknown, true),
        ]);
        let mut driver = ExportDriver::new(&client, Duration::ZERO);

        driver.run().await.unwrap();

        assert_eq!(driver.total_count(), TotalCount::Known(2));
    }

    #[tokio::test]
    async fn test_server_failure_marks_failed_without_retry() {
        let client = ScriptedClient::new(vec![
            page(&["a@x.io"], 1, TotalCount::Known(3), false),
            Ok(BatchResponse::failure("database went away")),
            page(&["b@x.io"], 2, TotalCount::Unknown, true),
        ]);
        let mut driver = ExportDriver::new(&client, Duration::ZERO);

        let err = driver.run().await.unwrap_err();

        assert!(matches!(err, DriverError::Server { offset: 1, .. }));
        assert_eq!(client.offsets(), [0, 1]);
        assert!(matches!(driver.state(), DriverState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_transport_error_marks_failed() {
        let client = ScriptedClient::new(vec![Err(TransportError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        })]);
        let mut driver = ExportDriver::new(&client, Duration::ZERO);

        let err = driver.run().await.unwrap_err();

        assert!(matches!(err, DriverError::Transport(_)));
        assert!(matches!(driver.state(), DriverState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_non_advancing_offset_is_stalled() {
        let client = ScriptedClient::new(vec![
            page(&["a@x.io"], 1, TotalCount::Known(9), false),
            page(&[], 1, TotalCount::Unknown, false),
        ]);
        let mut driver = ExportDriver::new(&client, Duration::ZERO);

        let err = driver.run().await.unwrap_err();

        assert!(matches!(err, DriverError::Stalled { offset: 1 }));
    }

    #[tokio::test]
    async fn test_driver_runs_once() {
        let client = ScriptedClient::new(vec![page(&[], 0, TotalCount::Known(0), true)]);
        let mut driver = ExportDriver::new(&client, Duration::ZERO);

        driver.run().await.unwrap();
        let err = driver.run().await.unwrap_err();

        assert!(matches!(err, DriverError::AlreadyRan(_)));
        assert_eq!(client.offsets(), [0]);
    }

    #[test]
    fn test_progress_format() {
        assert_eq!(progress(500, TotalCount::Known(1200)), "500/1200 (41%)");
        assert_eq!(progress(1200, TotalCount::Known(1200)), "1200/1200 (100%)");
        assert_eq!(progress(500, TotalCount::Unknown), "500");
        assert_eq!(progress(0, TotalCount::Known(0)), "0");
    }
}
