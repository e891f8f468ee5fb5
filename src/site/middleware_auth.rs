//! Who may write.
//!
//! Writes need a logged-in visitor: the [`Member`] extractor reads the acronym
//! from the visitor's session and rejects guests with 401. Whether a member
//! may touch a given row is left to the [`EditPolicy`] held in [`AppState`];
//! a refusal is 403.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use tracing::debug;

use super::middleware_session::session_cookie;
use super::AppState;
use crate::error::{Error, Result};
use crate::session::SessionStore;

/// Decides whether `user` may edit a row owned by `owner`. Rows without an
/// owner (movies, or an account nobody claims) pass `None`.
pub trait EditPolicy: Send + Sync {
    fn can_edit(&self, user: &str, owner: Option<&str>) -> bool;
}

/// The admin account edits everything; other members edit what they own.
#[derive(Debug, Clone)]
pub struct AdminOrOwner {
    pub admin: String,
}

impl Default for AdminOrOwner {
    fn default() -> Self {
        Self {
            admin: "admin".to_string(),
        }
    }
}

impl EditPolicy for AdminOrOwner {
    fn can_edit(&self, user: &str, owner: Option<&str>) -> bool {
        user == self.admin || owner == Some(user)
    }
}

/// Acronym of the logged-in visitor.
#[derive(Debug, Clone)]
pub struct Member(pub String);

impl Member {
    /// Ask the site's policy about a row owned by `owner`.
    pub fn authorize(&self, state: &AppState, owner: Option<&str>) -> Result<()> {
        if state.policy.can_edit(&self.0, owner) {
            Ok(())
        } else {
            debug!(user = %self.0, owner, "edit refused");
            Err(Error::Forbidden(format!("{} may not edit this", self.0)))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Member {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        session_cookie(parts)
            .and_then(|id| state.sessions.get(id))
            .and_then(|data| data.user)
            .map(Member)
            .ok_or_else(|| Error::Unauthorized("log in first".to_string()))
    }
}
