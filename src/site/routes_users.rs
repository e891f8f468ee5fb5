//! User account endpoints.
//!
//! | Endpoint | Access |
//! |----------|--------|
//! | `GET /api/users?acronym&name&hits&page&orderby&order` | anyone |
//! | `GET /api/users/{id}` | anyone |
//! | `POST /api/users` | anyone (sign-up) |
//! | `PUT /api/users/{id}` | the account itself, or the admin |
//! | `DELETE /api/users/{id}` | the admin |

use super::middleware_auth::Member;
use super::{path_id, AppState};
use crate::db::users::{self, UserFilter, UserInput};
use crate::error::Result;
use crate::search::{Row, SearchResult};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

pub(super) async fn handler_api_users(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<SearchResult>> {
    let result = users::search(&state.db, &filter, Some(state.config.default_hits)).await?;
    Ok(Json(result))
}

pub(super) async fn handler_api_user_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Row>> {
    let id = path_id(&id)?;
    Ok(Json(users::find_user(&state.db, id).await?))
}

pub(super) async fn handler_api_user_create(
    State(state): State<Arc<AppState>>,
    Json(user): Json<UserInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = state.db.create_user(&user).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// `PUT /api/users/{id}` — the account's owner is its current acronym.
pub(super) async fn handler_api_user_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    member: Member,
    Json(user): Json<UserInput>,
) -> Result<Json<Row>> {
    let id = path_id(&id)?;
    let owner = state.db.user_acronym(id).await?;
    member.authorize(&state, Some(&owner))?;
    state.db.update_user(id, &user).await?;
    Ok(Json(users::find_user(&state.db, id).await?))
}

pub(super) async fn handler_api_user_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    member: Member,
) -> Result<StatusCode> {
    let id = path_id(&id)?;
    member.authorize(&state, None)?;
    state.db.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
