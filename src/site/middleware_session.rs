//! Cookie sessions for site visitors.
//!
//! The `rm_session` cookie carries an opaque session id. A request without
//! the cookie, or with an id the store does not know, starts a fresh UUID v4
//! session; the new id is sent back with `Set-Cookie` once the handler
//! commits something to the session. Client-chosen ids are never adopted.
//!
//! Logging in is handled elsewhere; it only has to store a
//! [`SessionData`] with `user` set under the visitor's session id. The
//! `Member` extractor in `middleware_auth` reads that user back for writes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use super::AppState;
use crate::dice::DiceGame;
use crate::session::{SessionData, SessionStore};

pub const SESSION_COOKIE: &str = "rm_session";

/// The visitor's session, loaded (or started) for this request.
pub struct Visitor {
    pub id: String,
    pub data: SessionData,
    is_new: bool,
}

impl Visitor {
    pub fn user(&self) -> Option<&str> {
        self.data.user.as_deref()
    }

    /// The session game, started on first use.
    pub fn game_mut(&mut self) -> &mut DiceGame {
        self.data.dice.get_or_insert_with(DiceGame::new)
    }

    /// Write the session back and attach the cookie for new sessions.
    ///
    /// A new session that nothing was written to is not kept and gets no
    /// cookie.
    pub fn commit(self, state: &AppState, mut response: Response) -> Response {
        if self.is_new && self.data == SessionData::default() {
            return response;
        }
        state.sessions.put(&self.id, self.data);
        if self.is_new {
            let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => warn!(error = %e, "could not encode session cookie"),
            }
        }
        response
    }
}

/// Value of the session cookie, from any `Cookie` header on the request.
pub(super) fn session_cookie(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

impl FromRequestParts<Arc<AppState>> for Visitor {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(id) = session_cookie(parts) {
            if let Some(data) = state.sessions.get(id) {
                return Ok(Visitor {
                    id: id.to_string(),
                    data,
                    is_new: false,
                });
            }
            debug!("unknown session id, starting a new session");
        }

        Ok(Visitor {
            id: uuid::Uuid::new_v4().to_string(),
            data: SessionData::default(),
            is_new: true,
        })
    }
}
