//! News endpoints: `GET /api/news?hits&page` and `GET /api/news/{slug}`.

use super::AppState;
use crate::db::news::{self, NewsFilter};
use crate::error::Result;
use crate::search::{Row, SearchResult};
use axum::extract::{Path, Query, State};
use axum::Json;
use std::sync::Arc;

/// Published posts, newest first. Unpaged unless `hits` is given.
pub(super) async fn handler_api_news(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<NewsFilter>,
) -> Result<Json<SearchResult>> {
    Ok(Json(news::list(&state.db, &filter, news::DEFAULT_HITS).await?))
}

pub(super) async fn handler_api_news_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Row>> {
    Ok(Json(news::find_post(&state.db, &slug).await?))
}
