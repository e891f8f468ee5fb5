//! News posts from `rm_content`.
//!
//! Only published posts are visible: rows of type `post` whose `published`
//! time has passed and that are not deleted. Pages share the table and are
//! never listed here.

use crate::error::{Error, Result};
use crate::search::{
    BaseQuery, FilteredSearch, Op, PageSpec, Row, RowStore, SearchCriteria, SearchResult,
    SortDirection, SortSpec,
};
use serde::Deserialize;

const BASE: BaseQuery = BaseQuery {
    select: "id, slug, url, type, title, data, filter, author, published, created, updated",
    from: "rm_content",
    group_by: None,
};

/// Page size when a request names none: the blog lists every post.
pub const DEFAULT_HITS: Option<u32> = None;

const NEWEST_FIRST: SortSpec = SortSpec::new("updated", SortDirection::Desc);

fn criteria(slug: Option<&str>) -> SearchCriteria {
    SearchCriteria::new()
        .fixed("type = 'post'")
        .text("slug", Op::Eq, slug)
        .fixed("published <= NOW()")
        .fixed("deleted IS NULL")
}

#[derive(Deserialize, Default, Clone, Debug)]
pub struct NewsFilter {
    pub slug: Option<String>,
    pub hits: Option<String>,
    pub page: Option<String>,
}

impl NewsFilter {
    pub fn to_search(&self, default_hits: Option<u32>) -> Result<FilteredSearch> {
        let page = PageSpec::parse(self.hits.as_deref(), self.page.as_deref(), default_hits)?;
        Ok(FilteredSearch::new(
            BASE,
            criteria(self.slug.as_deref()),
            NEWEST_FIRST,
            page,
        ))
    }
}

/// Published posts, newest first. No posts is an empty result, not an error.
pub async fn list<S: RowStore + ?Sized>(
    store: &S,
    filter: &NewsFilter,
    default_hits: Option<u32>,
) -> Result<SearchResult> {
    filter.to_search(default_hits)?.search(store).await
}

/// The published post with this slug.
pub async fn find_post<S: RowStore + ?Sized>(store: &S, slug: &str) -> Result<Row> {
    let query = FilteredSearch::new(BASE, criteria(Some(slug)), NEWEST_FIRST, PageSpec::all())
        .build_filtered_query();
    crate::search::execute(store, &query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found("post", slug))
}
