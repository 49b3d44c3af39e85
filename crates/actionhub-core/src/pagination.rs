//! Sequential multi-page fetching.
//!
//! The [`Paginator`] owns the loop; the caller supplies a closure that performs
//! exactly one round trip for the page or cursor it is handed. Pages are fetched
//! strictly in order because each request depends on the previous response.

use crate::error::Fault;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// How an upstream paginates its collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageProtocol {
    /// `page=1,2,3...` with a fixed page size.
    #[default]
    PageNumber,
    /// Opaque continuation token handed back by each response.
    Cursor,
}

/// What happens to already-fetched items when a later page fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialResults {
    /// Propagate the failure and drop everything fetched so far.
    #[default]
    Discard,
    /// Return what was fetched together with the failure.
    BestEffort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState<T> {
    pub cursor: Option<String>,
    pub page_index: Option<u32>,
    pub accumulated: Vec<T>,
    pub exhausted: bool,
}

impl<T> PaginationState<T> {
    pub fn from_page(page_index: u32) -> Self {
        Self {
            cursor: None,
            page_index: Some(page_index.max(1)),
            accumulated: Vec::new(),
            exhausted: false,
        }
    }

    pub fn from_cursor(cursor: Option<String>) -> Self {
        Self {
            cursor,
            page_index: None,
            accumulated: Vec::new(),
            exhausted: false,
        }
    }
}

impl<T> Default for PaginationState<T> {
    fn default() -> Self {
        Self::from_page(1)
    }
}

/// Parameters for one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: Option<u32>,
    pub cursor: Option<String>,
    /// Number of items to ask for.
    pub limit: u32,
}

/// One page as returned by the upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    /// Collection size, when the upstream reports one.
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
            total: None,
        }
    }

    pub fn with_next_cursor(mut self, cursor: Option<String>) -> Self {
        self.next_cursor = cursor;
        self
    }

    pub fn with_total(mut self, total: Option<u64>) -> Self {
        self.total = total;
        self
    }
}

#[derive(Debug)]
pub struct PaginationOutcome<T, E> {
    pub state: PaginationState<T>,
    pub pages_fetched: u32,
    /// Set only under [`PartialResults::BestEffort`] when a page failed.
    pub interrupted: Option<E>,
}

impl<T, E> PaginationOutcome<T, E> {
    pub fn items(&self) -> &[T] {
        &self.state.accumulated
    }
}

#[derive(Debug, Error)]
pub enum PaginationError<E>
where
    E: std::error::Error + 'static,
{
    #[error("page fetch failed after {pages_fetched} page(s): {source}")]
    Fetch {
        pages_fetched: u32,
        #[source]
        source: E,
    },

    #[error("pagination cancelled")]
    Cancelled,

    #[error("upstream returned the cursor it was given ('{cursor}')")]
    Stalled { cursor: String },
}

impl From<PaginationError<Fault>> for Fault {
    fn from(err: PaginationError<Fault>) -> Self {
        match err {
            PaginationError::Fetch { source, .. } => source,
            PaginationError::Cancelled => Fault::Cancelled,
            PaginationError::Stalled { cursor } => Fault::Unexpected(format!(
                "pagination stalled: upstream repeated cursor '{}'",
                cursor
            )),
        }
    }
}

/// Drives a page or cursor sequence until exhaustion, the cap, or `max_pages`.
#[derive(Debug, Clone)]
pub struct Paginator {
    protocol: PageProtocol,
    page_size: u32,
    cap: Option<usize>,
    max_pages: u32,
    partial: PartialResults,
    cancel: Option<CancellationToken>,
}

impl Paginator {
    pub fn new(protocol: PageProtocol, page_size: u32) -> Self {
        Self {
            protocol,
            page_size: page_size.max(1),
            cap: None,
            max_pages: DEFAULT_MAX_PAGES,
            partial: PartialResults::Discard,
            cancel: None,
        }
    }

    pub fn page_number(page_size: u32) -> Self {
        Self::new(PageProtocol::PageNumber, page_size)
    }

    pub fn cursor(page_size: u32) -> Self {
        Self::new(PageProtocol::Cursor, page_size)
    }

    pub fn with_cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_partial_results(mut self, partial: PartialResults) -> Self {
        self.partial = partial;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn protocol(&self) -> PageProtocol {
        self.protocol
    }

    fn cap_reached(&self, accumulated: usize) -> bool {
        self.cap.is_some_and(|cap| accumulated >= cap)
    }

    fn next_request<T>(&self, state: &PaginationState<T>) -> PageRequest {
        match self.protocol {
            PageProtocol::PageNumber => PageRequest {
                page_index: Some(state.page_index.unwrap_or(1)),
                cursor: None,
                // Page offsets depend on a constant size, so the cap never shrinks it.
                limit: self.page_size,
            },
            PageProtocol::Cursor => {
                let remaining = self
                    .cap
                    .map(|cap| cap.saturating_sub(state.accumulated.len()))
                    .and_then(|r| u32::try_from(r).ok())
                    .unwrap_or(self.page_size);
                PageRequest {
                    page_index: None,
                    cursor: state.cursor.clone(),
                    limit: remaining.clamp(1, self.page_size),
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub async fn drive<T, E, F, Fut>(
        &self,
        mut fetch_one_page: F,
        initial: PaginationState<T>,
    ) -> Result<PaginationOutcome<T, E>, PaginationError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        let mut state = initial;
        let mut pages_fetched = 0u32;

        while !state.exhausted && !self.cap_reached(state.accumulated.len()) {
            if pages_fetched >= self.max_pages {
                tracing::debug!(
                    max_pages = self.max_pages,
                    "page limit reached before the collection was exhausted"
                );
                break;
            }
            if self.is_cancelled() {
                return Err(PaginationError::Cancelled);
            }

            let request = self.next_request(&state);
            tracing::debug!(
                page = ?request.page_index,
                cursor = ?request.cursor,
                limit = request.limit,
                "fetching page"
            );

            let fetched = match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(PaginationError::Cancelled),
                        result = fetch_one_page(request.clone()) => result,
                    }
                }
                None => fetch_one_page(request.clone()).await,
            };

            let page = match fetched {
                Ok(page) => page,
                Err(source) => {
                    return match self.partial {
                        PartialResults::Discard => Err(PaginationError::Fetch {
                            pages_fetched,
                            source,
                        }),
                        PartialResults::BestEffort => {
                            tracing::warn!(
                                pages_fetched,
                                error = %source,
                                "returning partial results after page failure"
                            );
                            Ok(PaginationOutcome {
                                state,
                                pages_fetched,
                                interrupted: Some(source),
                            })
                        }
                    };
                }
            };
            pages_fetched += 1;

            let received = page.items.len();
            state.accumulated.extend(page.items);

            match self.protocol {
                PageProtocol::PageNumber => {
                    let index = request.page_index.unwrap_or(1);
                    state.page_index = Some(index.saturating_add(1));
                    let short_page = received < request.limit as usize;
                    let seen = u64::from(index) * u64::from(self.page_size);
                    let total_reached = page.total.is_some_and(|total| seen >= total);
                    state.exhausted = short_page || total_reached;
                }
                PageProtocol::Cursor => match page.next_cursor.filter(|c| !c.is_empty()) {
                    None => {
                        state.cursor = None;
                        state.exhausted = true;
                    }
                    Some(next) if request.cursor.as_deref() == Some(next.as_str()) => {
                        return Err(PaginationError::Stalled { cursor: next });
                    }
                    Some(next) => state.cursor = Some(next),
                },
            }

            if let Some(cap) = self.cap {
                state.accumulated.truncate(cap);
            }
        }

        Ok(PaginationOutcome {
            state,
            pages_fetched,
            interrupted: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn numbered(page: u32, count: u32, size: u32) -> Vec<u32> {
        let start = (page - 1) * size;
        (start..start + count).collect()
    }

    #[tokio::test]
    async fn short_first_page_stops_after_one_fetch() {
        let calls = AtomicU32::new(0);
        let outcome = Paginator::page_number(100)
            .drive(
                |req| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Ok::<_, Fault>(Page::new(numbered(req.page_index.unwrap(), 2, 100)))
                    }
                },
                PaginationState::default(),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.items().len(), 2);
        assert!(outcome.state.exhausted);
    }

    #[tokio::test]
    async fn empty_first_page_is_exhausted_not_an_error() {
        let outcome = Paginator::page_number(10)
            .drive(
                |_| async { Ok::<_, Fault>(Page::<u32>::new(vec![])) },
                PaginationState::default(),
            )
            .await
            .unwrap();
        assert!(outcome.items().is_empty());
        assert!(outcome.state.exhausted);
        assert_eq!(outcome.pages_fetched, 1);
    }

    #[tokio::test]
    async fn full_pages_continue_until_short_page() {
        let outcome = Paginator::page_number(3)
            .drive(
                |req| async move {
                    let page = req.page_index.unwrap();
                    let count = if page < 3 { 3 } else { 1 };
                    Ok::<_, Fault>(Page::new(numbered(page, count, 3)))
                },
                PaginationState::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.pages_fetched, 3);
        assert_eq!(outcome.items(), &[0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(outcome.state.page_index, Some(4));
    }

    #[tokio::test]
    async fn reported_total_ends_the_walk() {
        let outcome = Paginator::page_number(2)
            .drive(
                |req| async move {
                    let items = numbered(req.page_index.unwrap(), 2, 2);
                    Ok::<_, Fault>(Page::new(items).with_total(Some(4)))
                },
                PaginationState::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.pages_fetched, 2);
        assert!(outcome.state.exhausted);
    }

    #[tokio::test]
    async fn cap_limits_fetches_and_items() {
        let calls = AtomicU32::new(0);
        let outcome = Paginator::page_number(10)
            .with_cap(Some(25))
            .drive(
                |req| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Ok::<_, Fault>(Page::new(numbered(req.page_index.unwrap(), 10, 10)))
                    }
                },
                PaginationState::default(),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.items().len(), 25);
        assert!(!outcome.state.exhausted);
    }

    #[tokio::test]
    async fn cursor_walk_follows_tokens_and_shrinks_last_request() {
        let limits = std::sync::Mutex::new(Vec::new());
        let outcome = Paginator::cursor(5)
            .with_cap(Some(12))
            .drive(
                |req| {
                    limits.lock().unwrap().push(req.limit);
                    async move {
                        let n: u32 = req.cursor.as_deref().map_or(0, |c| c.parse().unwrap());
                        let items: Vec<u32> = (n..n + req.limit).collect();
                        let next = Some((n + req.limit).to_string());
                        Ok::<_, Fault>(Page::new(items).with_next_cursor(next))
                    }
                },
                PaginationState::from_cursor(None),
            )
            .await
            .unwrap();
        assert_eq!(*limits.lock().unwrap(), vec![5, 5, 2]);
        assert_eq!(outcome.items().len(), 12);
        assert_eq!(outcome.state.cursor.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn cursor_walk_stops_on_missing_next_cursor() {
        let outcome = Paginator::cursor(5)
            .drive(
                |req| async move {
                    let next = req.cursor.is_none().then(|| "p2".to_string());
                    Ok::<_, Fault>(Page::new(vec![1u8, 2]).with_next_cursor(next))
                },
                PaginationState::from_cursor(None),
            )
            .await
            .unwrap();
        assert_eq!(outcome.pages_fetched, 2);
        assert!(outcome.state.exhausted);
        assert!(outcome.state.cursor.is_none());
    }

    #[tokio::test]
    async fn repeated_cursor_is_reported_as_stall() {
        let err = Paginator::cursor(5)
            .drive(
                |_| async {
                    Ok::<_, Fault>(Page::new(vec![1u8]).with_next_cursor(Some("same".into())))
                },
                PaginationState::from_cursor(Some("same".into())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::Stalled { .. }));
    }

    #[tokio::test]
    async fn failure_discards_partial_results_by_default() {
        let err = Paginator::page_number(2)
            .drive(
                |req| async move {
                    match req.page_index {
                        Some(1) => Ok(Page::new(vec![1u8, 2])),
                        _ => Err(Fault::unexpected("page two exploded")),
                    }
                },
                PaginationState::default(),
            )
            .await
            .unwrap_err();
        match err {
            PaginationError::Fetch {
                pages_fetched,
                source,
            } => {
                assert_eq!(pages_fetched, 1);
                assert!(source.to_string().contains("exploded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn best_effort_keeps_partial_results() {
        let outcome = Paginator::page_number(2)
            .with_partial_results(PartialResults::BestEffort)
            .drive(
                |req| async move {
                    match req.page_index {
                        Some(1) => Ok(Page::new(vec![1u8, 2])),
                        _ => Err(Fault::unexpected("page two exploded")),
                    }
                },
                PaginationState::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.items(), &[1, 2]);
        assert!(outcome.interrupted.is_some());
        assert!(!outcome.state.exhausted);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_page() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let err = Paginator::page_number(1)
            .with_cancellation(token.clone())
            .drive(
                |_| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n == 1 {
                        token.cancel();
                    }
                    async { Ok::<_, Fault>(Page::new(vec![0u8])) }
                },
                PaginationState::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn max_pages_bounds_a_runaway_walk() {
        let outcome = Paginator::page_number(1)
            .with_max_pages(4)
            .drive(
                |_| async { Ok::<_, Fault>(Page::new(vec![0u8])) },
                PaginationState::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.pages_fetched, 4);
        assert!(!outcome.state.exhausted);
    }
}
