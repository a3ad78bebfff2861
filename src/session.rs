//! Incremental pagination over one search.
//!
//! A [`SearchSession`] owns the cursor for the current query and decides when
//! another page may be requested. It replaces the "is loading / all loaded"
//! flags a UI would otherwise keep globally.
//!
//! ```text
//! Idle --search--> Loading(New) --ok--> Ready | Exhausted
//! Ready --load_more--> Loading(More) --ok--> Ready | Exhausted
//! any --search(new query)--> Loading(New)
//! ```

use crate::error::Result;
use crate::pubmed::{ArticleSource, SearchPage};
use crate::query::{SearchQuery, DEFAULT_PAGE_SIZE};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Which kind of page is being loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadKind {
    New,
    More,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    Loading(LoadKind),
    Ready,
    Exhausted,
}

/// Cursor into the remote result set for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaginationState {
    /// Index where the next page starts
    pub offset: u64,
    /// Total matches reported by the last page
    pub total_available: u64,
    pub exhausted: bool,
}

impl PaginationState {
    /// Apply a fetched page.
    ///
    /// The page is the last one when nothing matched, when it came back
    /// short, or when the cursor has reached the reported total.
    pub fn advance(&mut self, returned: usize, total: u64, page_size: u32) {
        self.offset += returned as u64;
        self.total_available = total;
        self.exhausted = total == 0 || returned < page_size as usize || self.offset >= total;
    }
}

/// Pagination driver for one query at a time.
pub struct SearchSession<S> {
    source: S,
    page_size: u32,
    query: Option<SearchQuery>,
    state: PaginationState,
    phase: SessionPhase,
}

impl<S: ArticleSource> SearchSession<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            query: None,
            state: PaginationState::default(),
            phase: SessionPhase::Idle,
        }
    }

    pub fn with_default_page_size(source: S) -> Self {
        Self::new(source, DEFAULT_PAGE_SIZE)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn pagination(&self) -> PaginationState {
        self.state
    }

    pub fn query(&self) -> Option<&SearchQuery> {
        self.query.as_ref()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Whether `load_more` would issue a request.
    pub fn can_load_more(&self) -> bool {
        self.query.is_some() && self.phase == SessionPhase::Ready && !self.state.exhausted
    }

    /// Start a new query and load its first page.
    ///
    /// Validation failures are returned before any request. If the first page
    /// fails, the session is left exhausted so no follow-up page is attempted.
    pub async fn search(&mut self, query: SearchQuery) -> Result<SearchPage> {
        query.validate()?;

        self.query = Some(query);
        self.state = PaginationState::default();
        self.phase = SessionPhase::Loading(LoadKind::New);

        match self.fetch_next().await {
            Ok(page) => {
                info!(
                    total = page.total,
                    returned = page.articles.len(),
                    exhausted = self.state.exhausted,
                    "First page loaded"
                );
                Ok(page)
            }
            Err(e) => {
                warn!(error = %e, "Search failed");
                self.state.exhausted = true;
                self.phase = SessionPhase::Exhausted;
                Err(e)
            }
        }
    }

    /// Load the next page of the current query.
    ///
    /// Returns `Ok(None)` without touching the source when there is no query,
    /// the results are exhausted, or a page is already being loaded. A failed
    /// page leaves the cursor where it was so the caller can try again.
    /// Dropping the future mid-request leaves the session loading until the
    /// next [`search`](Self::search).
    pub async fn load_more(&mut self) -> Result<Option<SearchPage>> {
        if !self.can_load_more() {
            debug!(phase = ?self.phase, "Not loading more");
            return Ok(None);
        }

        self.phase = SessionPhase::Loading(LoadKind::More);
        match self.fetch_next().await {
            Ok(page) => {
                debug!(
                    offset = self.state.offset,
                    returned = page.articles.len(),
                    "Next page loaded"
                );
                Ok(Some(page))
            }
            Err(e) => {
                warn!(error = %e, offset = self.state.offset, "Loading next page failed");
                self.phase = SessionPhase::Ready;
                Err(e)
            }
        }
    }

    async fn fetch_next(&mut self) -> Result<SearchPage> {
        let Some(query) = self.query.as_ref() else {
            return Ok(SearchPage::default());
        };

        let page = self
            .source
            .fetch_page(query, self.state.offset, self.page_size)
            .await?;

        self.state
            .advance(page.articles.len(), page.total, self.page_size);
        self.phase = if self.state.exhausted {
            SessionPhase::Exhausted
        } else {
            SessionPhase::Ready
        };
        Ok(page)
    }
}
