//! Collect every page of a paginated collection.

use std::future::Future;

use tracing::debug;

use crate::types::Page;

/// Fetch page 1, then every remaining page in order, and concatenate the
/// results. The first failing page aborts the walk.
pub async fn get_all<T, E, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let first = fetch_page(1).await?;
    let pages = first.pages;
    let mut items = first.data;
    items.reserve(usize::try_from(first.results).unwrap_or(0).saturating_sub(items.len()));

    for page in 2..=pages {
        let next = fetch_page(page).await?;
        debug!(page, pages, items = next.data.len(), "fetched page");
        items.extend(next.data);
    }
    Ok(items)
}
