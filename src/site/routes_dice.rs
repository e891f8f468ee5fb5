//! # Dice 100 API
//!
//! Every visitor plays their own game, kept in their session.
//!
//! | Endpoint | Action |
//! |----------|--------|
//! | `GET /api/dice` | current game |
//! | `POST /api/dice/roll` | roll once |
//! | `POST /api/dice/bank` | bank the accumulated score |
//! | `POST /api/dice/new` | start over |
//! | `GET /api/dice/scoreboard` | top scores |
//! | `POST /api/dice/scoreboard` | save a finished game (members only), then start over |

use super::middleware_session::Visitor;
use super::AppState;
use crate::db::ScoreEntry;
use crate::dice::{DiceGame, Player, RandomDie};
use crate::error::{Error, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// What the page needs to draw the game.
#[derive(Serialize)]
struct GameView<'a> {
    accumulated: u32,
    saved: u32,
    points: i32,
    has_finished: bool,
    last_face: Option<u8>,
    message: Option<&'a str>,
    /// Logged-in acronym; `None` for guests.
    player: Option<&'a str>,
    /// Whether this game may be submitted to the scoreboard.
    can_submit: bool,
}

fn game_response(visitor: Visitor, state: &AppState) -> Response {
    let body = {
        let game = visitor.data.dice.clone().unwrap_or_default();
        let player = visitor.user();
        Json(GameView {
            accumulated: game.accumulated(),
            saved: game.saved(),
            points: game.points(),
            has_finished: game.has_finished(),
            last_face: game.last_face(),
            message: game.message(),
            player,
            can_submit: player.is_some() && game.has_finished(),
        })
        .into_response()
    };
    visitor.commit(state, body)
}

/// `GET /api/dice`. Read-only: a visitor without a game sees a fresh one,
/// but nothing is stored until they play.
pub(super) async fn handler_dice_state(
    State(state): State<Arc<AppState>>,
    visitor: Visitor,
) -> Response {
    game_response(visitor, &state)
}

pub(super) async fn handler_dice_roll(
    State(state): State<Arc<AppState>>,
    mut visitor: Visitor,
) -> Response {
    let data = &mut visitor.data;
    let player = Player::from_acronym(data.user.as_deref());
    let game = data.dice.get_or_insert_with(DiceGame::new);
    if game.roll(&mut RandomDie::new(), player).is_some() && game.has_finished() {
        info!(points = game.points(), "dice game won");
    }
    game_response(visitor, &state)
}

pub(super) async fn handler_dice_bank(
    State(state): State<Arc<AppState>>,
    mut visitor: Visitor,
) -> Response {
    visitor.game_mut().bank_score();
    game_response(visitor, &state)
}

pub(super) async fn handler_dice_new(
    State(state): State<Arc<AppState>>,
    mut visitor: Visitor,
) -> Response {
    visitor.game_mut().new_game();
    game_response(visitor, &state)
}

/// `GET /api/dice/scoreboard` — the configured number of best scores.
pub(super) async fn handler_scoreboard_list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ScoreEntry>>> {
    Ok(Json(state.db.top_scores(state.config.scoreboard_size).await?))
}

/// `POST /api/dice/scoreboard` — save the visitor's finished game.
///
/// Guests get 401 and unfinished games 409. On success the game is reset.
pub(super) async fn handler_scoreboard_submit(
    State(state): State<Arc<AppState>>,
    mut visitor: Visitor,
) -> Result<Response> {
    let Some(acronym) = visitor.user().map(str::to_string) else {
        return Err(Error::Unauthorized(
            "log in to enter the scoreboard".to_string(),
        ));
    };
    let game = visitor.game_mut();
    if !game.has_finished() {
        return Err(Error::Conflict(
            "only a finished game can be saved".to_string(),
        ));
    }

    let points = game.points();
    let name = state
        .db
        .user_name(&acronym)
        .await?
        .unwrap_or_else(|| acronym.clone());
    let entry = ScoreEntry {
        acronym,
        name,
        points,
    };
    state.db.save_score(&entry).await?;
    info!(acronym = %entry.acronym, points, "score saved");

    visitor.game_mut().new_game();
    let body = (StatusCode::CREATED, Json(entry)).into_response();
    Ok(visitor.commit(&state, body))
}
