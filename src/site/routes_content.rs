//! Writing posts and pages.
//!
//! Any member may write; the writer becomes the row's author. Editing and
//! deleting go through the site's edit policy with the author as owner.
//! `DELETE /api/content/{id}` hides the row; `?erase=true` removes it.

use super::middleware_auth::Member;
use super::{path_id, AppState};
use crate::db::content::ContentInput;
use crate::error::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize, Default, Debug)]
pub(super) struct DeleteParams {
    #[serde(default)]
    erase: bool,
}

pub(super) async fn handler_api_content_create(
    State(state): State<Arc<AppState>>,
    Member(author): Member,
    Json(content): Json<ContentInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = state.db.create_content(&author, &content).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "slug": content.slug() })),
    ))
}

pub(super) async fn handler_api_content_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    member: Member,
    Json(content): Json<ContentInput>,
) -> Result<StatusCode> {
    let id = path_id(&id)?;
    let author = state.db.content_author(id).await?;
    member.authorize(&state, author.as_deref())?;
    state.db.update_content(id, &content).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn handler_api_content_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
    member: Member,
) -> Result<StatusCode> {
    let id = path_id(&id)?;
    let author = state.db.content_author(id).await?;
    member.authorize(&state, author.as_deref())?;
    if params.erase {
        state.db.erase_content(id).await?;
    } else {
        state.db.delete_content(id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
