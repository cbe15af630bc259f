//! Article lookup by identifier
//!
//! The provider has no fetch-by-id endpoint, so lookup walks the whole feed.
//! An exact match on the primary id wins as soon as it is seen. Looser
//! matches (secondary id, or the same number written differently) are
//! remembered and only returned once the feed is exhausted without an
//! exact hit.

use laterbridge_core::{Item, ProviderError};
use tracing::debug;

use crate::executor::AuthedExecutor;
use crate::feed::FeedWalk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMatch {
    Exact,
    Loose,
}

/// Compare an item against a requested identifier
pub fn match_id(item: &Item, wanted: &str) -> Option<IdMatch> {
    let wanted = wanted.trim();
    if item.id == wanted {
        return Some(IdMatch::Exact);
    }
    if item.secondary_id.as_deref() == Some(wanted) {
        return Some(IdMatch::Loose);
    }

    let wanted_num = numeric(wanted)?;
    let candidates = std::iter::once(item.id.as_str()).chain(item.secondary_id.as_deref());
    for candidate in candidates {
        if numeric(candidate) == Some(wanted_num) {
            return Some(IdMatch::Loose);
        }
    }
    None
}

fn numeric(value: &str) -> Option<i128> {
    value.trim().parse::<i128>().ok()
}

/// Find one item, or `None` after a full traversal without a match
pub async fn find(
    executor: &mut AuthedExecutor,
    identifier: &str,
) -> Result<Option<Item>, ProviderError> {
    let mut walk = FeedWalk::new(None);
    let mut fallback: Option<Item> = None;
    let mut scanned = 0usize;

    while let Some(page) = walk.next_page(executor).await? {
        for item in page.items {
            scanned += 1;
            match match_id(&item, identifier) {
                Some(IdMatch::Exact) => {
                    debug!(
                        "[Locator] Found {} after {} items on page {}",
                        identifier,
                        scanned,
                        walk.pages()
                    );
                    return Ok(Some(item));
                }
                Some(IdMatch::Loose) if fallback.is_none() => fallback = Some(item),
                _ => {}
            }
        }
    }

    debug!(
        "[Locator] Scanned {} items across {} pages for {}: {}",
        scanned,
        walk.pages(),
        identifier,
        if fallback.is_some() { "loose match" } else { "not found" }
    );
    Ok(fallback)
}
