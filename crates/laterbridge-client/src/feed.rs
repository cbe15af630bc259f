//! Feed pagination
//!
//! The reading list is a cursor-linked chain of pages. Pages are fetched
//! strictly in order because each cursor is only known once the previous
//! page has arrived.

use std::collections::HashSet;

use laterbridge_core::{FeedPage, Item, ProviderError};
use reqwest::Method;
use tracing::debug;

use crate::executor::AuthedExecutor;
use crate::normalize;

/// Result of [`collect`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedCollection {
    pub items: Vec<Item>,
    /// Cursor carried by the last fetched page; `None` once the feed is exhausted
    pub next_cursor: Option<String>,
}

/// Page-by-page walk over the feed.
///
/// Every cursor handed out must be new within one walk; a provider that
/// repeats a cursor would otherwise keep the walk alive forever.
#[derive(Debug)]
pub struct FeedWalk {
    next: Option<String>,
    started: bool,
    finished: bool,
    seen: HashSet<String>,
    pages: usize,
}

impl FeedWalk {
    /// Start at the first page, or at `start_cursor` when given
    pub fn new(start_cursor: Option<&str>) -> Self {
        let next = start_cursor
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let seen = next.iter().cloned().collect();
        Self {
            next,
            started: false,
            finished: false,
            seen,
            pages: 0,
        }
    }

    /// Pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Fetch the next page, or `None` once the previous page had no cursor
    pub async fn next_page(
        &mut self,
        executor: &mut AuthedExecutor,
    ) -> Result<Option<FeedPage>, ProviderError> {
        if self.finished {
            return Ok(None);
        }

        let url = match (&self.next, self.started) {
            (Some(cursor), _) => cursor_url(executor, cursor)?,
            (None, false) => executor.resolve(&executor.config().feed_path)?,
            (None, true) => {
                self.finished = true;
                return Ok(None);
            }
        };
        self.started = true;

        let body = executor.execute(Method::GET, &url, None).await?;
        let page = normalize::feed_page(body)?;
        self.pages += 1;

        debug!(
            "[Feed] Page {}: {} items, next={}",
            self.pages,
            page.items.len(),
            page.next_cursor.as_deref().unwrap_or("-")
        );

        match &page.next_cursor {
            Some(cursor) if !self.seen.insert(cursor.clone()) => {
                self.finished = true;
                return Err(ProviderError::failed(format!(
                    "provider repeated feed cursor {:?}",
                    cursor
                )));
            }
            Some(cursor) => self.next = Some(cursor.clone()),
            None => {
                self.next = None;
                self.finished = true;
            }
        }

        Ok(Some(page))
    }
}

/// Cursors are either absolute URLs or opaque tokens for the feed endpoint
fn cursor_url(executor: &AuthedExecutor, cursor: &str) -> Result<url::Url, ProviderError> {
    if cursor.starts_with("http://") || cursor.starts_with("https://") {
        return executor.resolve(cursor);
    }
    let mut url = executor.resolve(&executor.config().feed_path)?;
    url.query_pairs_mut().append_pair("cursor", cursor);
    Ok(url)
}

/// Accumulate items until `limit` is reached or the feed ends.
///
/// No clamping happens here; `usize::MAX` walks the whole feed. When the
/// limit cuts a page short, the surplus items are dropped and the cursor of
/// that page is returned, so the caller resumes after it.
pub async fn collect(
    executor: &mut AuthedExecutor,
    limit: usize,
    start_cursor: Option<&str>,
) -> Result<FeedCollection, ProviderError> {
    if limit == 0 {
        return Ok(FeedCollection {
            items: Vec::new(),
            next_cursor: start_cursor.map(str::to_string),
        });
    }

    let mut walk = FeedWalk::new(start_cursor);
    let mut items = Vec::new();

    while let Some(page) = walk.next_page(executor).await? {
        items.extend(page.items);
        if items.len() >= limit {
            items.truncate(limit);
            return Ok(FeedCollection {
                items,
                next_cursor: page.next_cursor,
            });
        }
    }

    Ok(FeedCollection {
        items,
        next_cursor: None,
    })
}
