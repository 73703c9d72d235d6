// Query/Feed Engine: pure pagination math plus the composition of store
// queries into the four post feeds (global, group, profile, follow).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::PostRecord;
use crate::store::{BlogStore, PostFilter};

/// One page of an ordered result set.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub number: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub items: Vec<T>,
}

/// Number of pages needed for `total_items`; an empty set still has one
/// (empty) page, matching the page-clamping contract.
pub fn total_pages(total_items: i64, page_size: i64) -> i64 {
    if total_items <= 0 {
        return 1;
    }
    (total_items + page_size - 1) / page_size
}

/// Clamps a requested 1-indexed page into [1, total_pages]. Absent or
/// unparsable requests land on the first page, overshoots on the last.
pub fn clamp_page(requested: Option<i64>, total_pages: i64) -> i64 {
    match requested {
        None => 1,
        Some(n) if n < 1 => 1,
        Some(n) if n > total_pages => total_pages,
        Some(n) => n,
    }
}

/// `?page=` query parameter. Captured as a raw string so that junk values
/// clamp to the first page instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn requested(&self) -> Option<i64> {
        self.page.as_deref().and_then(|raw| raw.parse().ok())
    }
}

#[derive(Clone)]
pub struct FeedEngine {
    store: Arc<BlogStore>,
    page_size: i64,
}

impl FeedEngine {
    pub fn new(store: Arc<BlogStore>, page_size: i64) -> Self {
        Self { store, page_size }
    }

    /// All posts, newest first.
    pub async fn global(&self, requested: Option<i64>) -> anyhow::Result<Page<PostRecord>> {
        self.paged(PostFilter::All, requested).await
    }

    /// Posts belonging to one group, newest first.
    pub async fn group(
        &self,
        group_id: i64,
        requested: Option<i64>,
    ) -> anyhow::Result<Page<PostRecord>> {
        self.paged(PostFilter::Group(group_id), requested).await
    }

    /// One author's posts, newest first.
    pub async fn author(
        &self,
        author_id: i64,
        requested: Option<i64>,
    ) -> anyhow::Result<Page<PostRecord>> {
        self.paged(PostFilter::Author(author_id), requested).await
    }

    /// Posts by every author the viewer follows, newest first.
    pub async fn following(
        &self,
        viewer_id: i64,
        requested: Option<i64>,
    ) -> anyhow::Result<Page<PostRecord>> {
        let authors = self.store.followed_author_ids(viewer_id).await?;
        self.paged(PostFilter::Authors(authors), requested).await
    }

    async fn paged(
        &self,
        filter: PostFilter,
        requested: Option<i64>,
    ) -> anyhow::Result<Page<PostRecord>> {
        let total_items = self.store.count_posts(&filter).await?;
        let pages = total_pages(total_items, self.page_size);
        let number = clamp_page(requested, pages);
        let offset = (number - 1) * self.page_size;
        let items = self.store.list_posts(&filter, self.page_size, offset).await?;

        Ok(Page {
            number,
            total_pages: pages,
            total_items,
            has_previous: number > 1,
            has_next: number < pages,
            items,
        })
    }
}
