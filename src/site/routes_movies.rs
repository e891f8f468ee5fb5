//! # Movie Catalogue API
//!
//! | Endpoint | Returns |
//! |----------|---------|
//! | `GET /api/movies?title&year1&year2&genre&hits&page&orderby&order` | one page of matches plus paging totals |
//! | `GET /api/movies/{id}` | a single movie |
//! | `GET /api/genres` | genre names in use |
//! | `POST /api/movies` | `201` and the new id (admin) |
//! | `PUT /api/movies/{id}` | the stored movie (admin) |
//! | `DELETE /api/movies/{id}` | `204` (admin) |
//! | `POST /api/movies/{id}/rent` | the updated rent counters (any member) |
//!
//! Movies have no owner, so only the policy's admin passes for edits.

use super::middleware_auth::Member;
use super::{path_id, AppState};
use crate::db::movies::{self, MovieFilter, MovieInput, Rental};
use crate::error::Result;
use crate::search::{Row, SearchResult};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

/// `GET /api/movies` — filtered, sorted and paged movie search.
///
/// Without `hits` the configured default page size applies.
pub(super) async fn handler_api_movies(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<MovieFilter>,
) -> Result<Json<SearchResult>> {
    let result = movies::search(&state.db, &filter, Some(state.config.default_hits)).await?;
    Ok(Json(result))
}

/// `GET /api/movies/{id}`
pub(super) async fn handler_api_movie_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Row>> {
    let id = path_id(&id)?;
    Ok(Json(movies::find_movie(&state.db, id).await?))
}

pub(super) async fn handler_api_genres(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(movies::list_genres(&state.db).await?))
}

pub(super) async fn handler_api_movie_create(
    State(state): State<Arc<AppState>>,
    member: Member,
    Json(movie): Json<MovieInput>,
) -> Result<(StatusCode, Json<Value>)> {
    member.authorize(&state, None)?;
    let id = state.db.create_movie(&movie).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub(super) async fn handler_api_movie_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    member: Member,
    Json(movie): Json<MovieInput>,
) -> Result<Json<Row>> {
    let id = path_id(&id)?;
    member.authorize(&state, None)?;
    state.db.update_movie(id, &movie).await?;
    Ok(Json(movies::find_movie(&state.db, id).await?))
}

pub(super) async fn handler_api_movie_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    member: Member,
) -> Result<StatusCode> {
    let id = path_id(&id)?;
    member.authorize(&state, None)?;
    state.db.delete_movie(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/movies/{id}/rent` — any logged-in member may rent.
pub(super) async fn handler_api_movie_rent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Member(acronym): Member,
) -> Result<Json<Rental>> {
    let id = path_id(&id)?;
    Ok(Json(state.db.rent_movie(id, &acronym).await?))
}
