//! # Database — PostgreSQL Storage Layer
//!
//! Async access to the Rental Movies tables through a `sqlx::PgPool`.
//!
//! ## Schema
//!
//! - `rm_movie`: title, director, length, year, plot, image, price, rents, …
//! - `rm_genre`, `rm_movie2genre`: genre names and the movie/genre link table
//! - `rm_content`: news posts and pages (`type`, `slug`, `published`, …)
//! - `rm_user`: user accounts
//! - `rm_game`: Dice 100 scoreboard
//!
//! ## Module Structure
//!
//! Listing operations are expressed as [`FilteredSearch`](crate::search::FilteredSearch)
//! definitions and run through the [`RowStore`] implementation below:
//!
//! - [`movies`] — movie search, lookup by id, genre list; create, edit, delete, rent
//! - [`news`] — news listing and lookup by slug
//! - [`content`] — writing posts and pages: create, edit, delete, erase
//! - [`users`] — user account search and lookup by id; create, update, delete
//! - [`scoreboard`] — Dice 100 top scores and score submission
//!
//! Writes are plain `impl Database` methods with bound parameters; the ones
//! touching more than one table run in a transaction.
//!
//! ## Rows
//!
//! `fetch_rows` wraps each built query as `SELECT row_to_json(q) FROM (…) AS q`
//! so any search shape comes back as JSON objects keyed by column name, in the
//! order the inner query produced them.

pub mod content;
pub mod movies;
pub mod news;
pub mod scoreboard;
pub mod users;

use crate::error::{Error, Result};
use crate::search::{BindValue, BuiltQuery, Row, RowStore};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

pub use scoreboard::ScoreEntry;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL using the provided database URL.
    ///
    /// Parses the URL by hand so that percent-encoded user names and
    /// passwords reach the server decoded.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let url = url::Url::parse(database_url)?;
        let username = urlencoding::decode(url.username())?.into_owned();
        let password = url
            .password()
            .map(|p| urlencoding::decode(p).map(|s| s.into_owned()))
            .transpose()?;
        let host = url.host_str().unwrap_or("localhost");
        info!(host, database = url.path().trim_start_matches('/'), "connecting to database");
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(url.port().unwrap_or(5432))
            .database(url.path().trim_start_matches('/'))
            .username(&username);
        if let Some(ref pw) = password {
            opts = opts.password(pw);
        }
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        Ok(Database { pool })
    }

    /// Wrap an existing pool (tests, embedding).
    pub fn from_pool(pool: PgPool) -> Self {
        Database { pool }
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    ///
    /// Used by the `/readyz` readiness probe.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// A unique-key violation becomes [`Error::Conflict`]; anything else stays a
/// store error.
pub(crate) fn conflict_on_duplicate(e: sqlx::Error, message: impl FnOnce() -> String) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(message()),
        _ => Error::Store(e),
    }
}

/// Reject blank or over-long text before it reaches a sized column.
pub(crate) fn check_text(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    if let Some(v) = value {
        if v.chars().count() > max {
            return Err(Error::Validation(format!(
                "{field} must be at most {max} characters"
            )));
        }
    }
    Ok(())
}

/// A required text field: present, not blank, and within `max` characters.
pub(crate) fn require_text<'a>(field: &str, value: Option<&'a str>, max: usize) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => {
            check_text(field, Some(v), max)?;
            Ok(v)
        }
        _ => Err(Error::Validation(format!("{field} is required"))),
    }
}

impl RowStore for Database {
    async fn fetch_rows(&self, query: &BuiltQuery) -> Result<Vec<Row>> {
        let sql = format!("SELECT row_to_json(q) AS row FROM ({}) AS q", query.sql);
        let mut rows = sqlx::query_scalar::<_, Value>(&sql);
        for value in &query.params {
            rows = match value {
                BindValue::Text(v) => rows.bind(v.clone()),
                BindValue::Int(v) => rows.bind(*v),
            };
        }

        rows.fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|value| match value {
                Value::Object(row) => Ok(row),
                other => Err(Error::Query(format!("expected a row object, got {other}"))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_is_trimmed() {
        assert_eq!(require_text("title", Some("  Alien "), 10).unwrap(), "Alien");
        for blank in [None, Some(""), Some("   ")] {
            assert!(matches!(
                require_text("title", blank, 10),
                Err(Error::Validation(msg)) if msg == "title is required"
            ));
        }
    }

    #[test]
    fn text_length_counts_characters() {
        assert!(check_text("speech", Some("swe"), 3).is_ok());
        assert!(check_text("speech", Some("åäö"), 3).is_ok());
        assert!(check_text("speech", Some("svenska"), 3).is_err());
        assert!(check_text("speech", None, 3).is_ok());
    }

    #[test]
    fn other_store_errors_are_not_conflicts() {
        let err = conflict_on_duplicate(sqlx::Error::RowNotFound, || "taken".to_string());
        assert!(matches!(err, Error::Store(_)));
    }
}
