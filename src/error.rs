//! # Errors — Crate-wide Error Taxonomy
//!
//! Every fallible library operation returns [`Result`]. The variants keep the
//! distinctions callers rely on: a store failure is never an empty result, and
//! an identity lookup that matched nothing is not the same as a search that
//! matched nothing.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The backing store was unreachable or rejected the query.
    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    /// The store answered, but not with the shape the query promised.
    #[error("query error: {0}")]
    Query(String),

    /// A lookup by unique key (id, slug) matched zero rows.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Caller input rejected before any query was built.
    #[error("validation error: {0}")]
    Validation(String),

    /// No logged-in user where one is required.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Logged in, but not allowed to change this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl Error {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Error::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// True for failures of the backing store rather than of the caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Query(_))
    }
}
