//! # Site — JSON API Server
//!
//! Runs an Axum HTTP server in front of the movie catalogue, the news posts,
//! the user accounts and the Dice 100 game.
//!
//! | Area | Routes |
//! |------|--------|
//! | Movies | `GET|POST /api/movies`, `GET|PUT|DELETE /api/movies/{id}`, `POST /api/movies/{id}/rent`, `GET /api/genres` |
//! | News | `GET /api/news`, `GET /api/news/{slug}` |
//! | Content | `POST /api/content`, `PUT|DELETE /api/content/{id}` |
//! | Users | `GET|POST /api/users`, `GET|PUT|DELETE /api/users/{id}` |
//! | Dice 100 | `GET /api/dice`, `POST /api/dice/{roll,bank,new}`, `GET|POST /api/dice/scoreboard` |
//! | Probes | `GET /healthz`, `GET /readyz` |
//!
//! Each visitor is tracked by the `rm_session` cookie (see [`middleware_session`]).
//! Writes need a logged-in member and pass the [`EditPolicy`] (see
//! [`middleware_auth`]).
//! Library errors map onto HTTP statuses in the [`IntoResponse`] impl below.

pub(crate) mod middleware_auth;
pub(crate) mod middleware_session;
mod routes_content;
mod routes_dice;
mod routes_health;
mod routes_movies;
mod routes_news;
mod routes_users;

use crate::db::Database;
use crate::error::Error;
use crate::search::parse_int;
use crate::session::{self, MemorySessionStore, SessionData};
use anyhow::Result;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn, Instrument};

pub use middleware_auth::{AdminOrOwner, EditPolicy, Member};
pub use middleware_session::SESSION_COOKIE;

/// Site-wide settings taken from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteConfig {
    /// Page size for movie and user listings when the request names none.
    pub default_hits: u32,
    /// Number of entries shown on the Dice 100 scoreboard.
    pub scoreboard_size: i64,
    /// Idle time after which a visitor session is dropped.
    pub session_ttl: Duration,
    /// Most visitor sessions kept in memory.
    pub max_sessions: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            default_hits: 8,
            scoreboard_size: 5,
            session_ttl: session::SESSION_TTL,
            max_sessions: session::MAX_SESSIONS,
        }
    }
}

pub struct AppState {
    pub db: Database,
    pub sessions: MemorySessionStore<SessionData>,
    pub config: SiteConfig,
    pub policy: Arc<dyn EditPolicy>,
}

impl AppState {
    pub fn new(db: Database, config: SiteConfig, policy: Arc<dyn EditPolicy>) -> Arc<Self> {
        Arc::new(AppState {
            db,
            sessions: MemorySessionStore::with_limits(config.session_ttl, config.max_sessions),
            config,
            policy,
        })
    }

    /// State with the default policy: `admin` edits everything.
    pub fn with_db(db: Database, config: SiteConfig) -> Arc<Self> {
        Self::new(db, config, Arc::new(AdminOrOwner::default()))
    }
}

/// Numeric id from a path segment.
pub(crate) fn path_id(raw: &str) -> crate::error::Result<i64> {
    parse_int("id", Some(raw))?.ok_or_else(|| Error::Validation("id must be numeric".to_string()))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Store(_) | Error::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if self.is_internal() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Generates (or propagates) a request ID and wraps the request in a tracing
/// span using `.instrument()` so it follows the handler across awaits.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/movies",
            get(routes_movies::handler_api_movies).post(routes_movies::handler_api_movie_create),
        )
        .route(
            "/api/movies/{id}",
            get(routes_movies::handler_api_movie_get)
                .put(routes_movies::handler_api_movie_update)
                .delete(routes_movies::handler_api_movie_delete),
        )
        .route("/api/movies/{id}/rent", post(routes_movies::handler_api_movie_rent))
        .route("/api/genres", get(routes_movies::handler_api_genres))
        .route("/api/news", get(routes_news::handler_api_news))
        .route("/api/news/{slug}", get(routes_news::handler_api_news_post))
        .route("/api/content", post(routes_content::handler_api_content_create))
        .route(
            "/api/content/{id}",
            put(routes_content::handler_api_content_update)
                .delete(routes_content::handler_api_content_delete),
        )
        .route(
            "/api/users",
            get(routes_users::handler_api_users).post(routes_users::handler_api_user_create),
        )
        .route(
            "/api/users/{id}",
            get(routes_users::handler_api_user_get)
                .put(routes_users::handler_api_user_update)
                .delete(routes_users::handler_api_user_delete),
        )
        .route("/api/dice", get(routes_dice::handler_dice_state))
        .route("/api/dice/roll", post(routes_dice::handler_dice_roll))
        .route("/api/dice/bank", post(routes_dice::handler_dice_bank))
        .route("/api/dice/new", post(routes_dice::handler_dice_new))
        .route(
            "/api/dice/scoreboard",
            get(routes_dice::handler_scoreboard_list).post(routes_dice::handler_scoreboard_submit),
        )
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .with_state(state)
}

pub async fn run(addr: SocketAddr, database_url: &str, config: SiteConfig) -> Result<()> {
    let database = Database::connect(database_url).await?;
    let state = AppState::with_db(database, config);
    let app = build_router(state.clone());

    // Background task: drop idle visitor sessions
    let prune_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let pruned = prune_state.sessions.prune_stale();
            if pruned > 0 {
                debug!(count = pruned, "pruned idle sessions");
            }
        }
    });

    info!(%addr, default_hits = config.default_hits, "site running");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("site shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}
