//! # Rental Movies
//!
//! Backend of a small movie rental site: searchable movie catalogue, news
//! posts, user accounts and the Dice 100 game with its scoreboard.
//!
//! ## Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`search`] | Filtered/sorted/paged query builder shared by every listing |
//! | [`db`] | PostgreSQL store, the concrete movie, news, user and scoreboard queries, and the site's writes |
//! | [`dice`] | Dice 100 game state machine |
//! | [`session`] | Per-visitor session storage |
//! | [`site`] | Axum JSON API and its edit policy |
//! | [`error`] | Error taxonomy shared by all of the above |

pub mod db;
pub mod dice;
pub mod error;
pub mod search;
pub mod session;
pub mod site;

pub use error::{Error, Result};
