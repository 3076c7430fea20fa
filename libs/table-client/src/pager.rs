use std::pin::Pin;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use storage_core::StorageError;

use crate::entity::decode_entries;
use crate::query::{QueryExecutor, TableQuery};
use crate::record::{ContinuationToken, Page, TableRecord};

/// Lazy, finite, single-consumer sequence of decoded pages.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<Page, StorageError>> + Send>>;

enum PagerState {
    /// Next request to issue, with the token from the previous page.
    Active(Option<ContinuationToken>),
    Done,
}

// ═══════════════════════════════════════════════════════════════
//  Pager: continuation-token state machine
// ═══════════════════════════════════════════════════════════════

/// Drives the query executor one page at a time, threading the
/// continuation token of each response into the next request.
///
/// Each [`next_page`](Pager::next_page) performs at most one request.
/// Cancellation is observed before a request is issued and again after
/// its response arrives, so a cancelled pager neither sends nor yields
/// anything further. Errors are yielded once, then the pager is done.
pub struct Pager {
    executor: QueryExecutor,
    table: String,
    query: TableQuery,
    cancel: CancellationToken,
    state: PagerState,
    pages: usize,
}

impl Pager {
    pub fn new(executor: QueryExecutor, table: impl Into<String>, query: TableQuery, cancel: CancellationToken) -> Self {
        Self {
            executor,
            table: table.into(),
            query,
            cancel,
            state: PagerState::Active(None),
            pages: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, PagerState::Done)
    }

    /// Pages yielded so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Fetch and decode the next page. `None` once the final page has
    /// been yielded, after an error, or after cancellation.
    pub async fn next_page(&mut self) -> Option<Result<Page, StorageError>> {
        let continuation = match &self.state {
            PagerState::Done => return None,
            PagerState::Active(token) => token.clone(),
        };

        if self.cancel.is_cancelled() {
            tracing::debug!(table = %self.table, pages = self.pages, "pagination cancelled");
            self.state = PagerState::Done;
            return None;
        }

        let fetched = self
            .executor
            .fetch_page(&self.table, &self.query, continuation.as_ref())
            .await;

        // Checked before looking at the outcome: failures are dropped too.
        if self.cancel.is_cancelled() {
            tracing::debug!(table = %self.table, pages = self.pages, "pagination cancelled, dropping response");
            self.state = PagerState::Done;
            return None;
        }

        let response = match fetched {
            Ok(r) => r,
            Err(e) => {
                self.state = PagerState::Done;
                return Some(Err(e));
            }
        };

        let records = match decode_entries(&response.response.body) {
            Ok(r) => r,
            Err(e) => {
                self.state = PagerState::Done;
                return Some(Err(e));
            }
        };

        self.pages += 1;
        self.state = match &response.continuation {
            Some(token) => PagerState::Active(Some(token.clone())),
            None => PagerState::Done,
        };
        Some(Ok(Page {
            records,
            continuation: response.continuation,
        }))
    }

    pub fn into_stream(self) -> PageStream {
        Box::pin(async_stream::stream! {
            let mut pager = self;
            while let Some(page) = pager.next_page().await {
                yield page;
            }
        })
    }
}

/// Eager mode: one request, no continuation.
pub async fn first_page(
    executor: &QueryExecutor,
    table: &str,
    query: &TableQuery,
) -> Result<Vec<TableRecord>, StorageError> {
    let response = executor.fetch_page(table, query, None).await?;
    decode_entries(&response.response.body)
}
