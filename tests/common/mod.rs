//! Shared test helpers for integration tests.

#![allow(dead_code)]

use rentalmovies::db::Database;
use rentalmovies::site::{AppState, SiteConfig};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
/// Panics if the variable is not set.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for integration tests")
}

/// Returns true if the test database URL is configured.
pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// One-time schema initialization.
static SCHEMA_INIT: OnceCell<()> = OnceCell::const_new();

/// Ensure the test database schema exists (runs the migration once per test binary).
pub async fn ensure_schema() {
    SCHEMA_INIT
        .get_or_init(|| async {
            let pool = sqlx::PgPool::connect(&test_db_url()).await.unwrap();
            let path =
                std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations/001_rental_movies.sql");
            let sql = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("Migration file {} unreadable: {}", path.display(), e));
            sqlx::raw_sql(&sql)
                .execute(&pool)
                .await
                .unwrap_or_else(|e| panic!("Migration failed: {}", e));
        })
        .await;
}

/// Connect to the test database, reset every table and load the seed data.
pub async fn setup_test_db() -> Database {
    ensure_schema().await;
    let db = Database::connect(&test_db_url())
        .await
        .expect("Failed to connect to test database");
    truncate_all_tables(db.pool()).await;
    seed(db.pool()).await;
    db
}

/// App state over a freshly seeded test database.
pub async fn build_test_state() -> Arc<AppState> {
    AppState::with_db(setup_test_db().await, SiteConfig::default())
}

/// Build an Axum test app router connected to the test database.
pub async fn build_test_app() -> axum::Router {
    rentalmovies::site::build_router(build_test_state().await)
}

/// App state whose pool never connects: enough for routes that fail
/// validation or never touch the database (dice, liveness).
pub fn offline_state() -> Arc<AppState> {
    offline_state_with(SiteConfig::default())
}

pub fn offline_state_with(config: SiteConfig) -> Arc<AppState> {
    AppState::with_db(offline_db(), config)
}

/// A database handle whose pool never connects.
pub fn offline_db() -> Database {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy("postgres://nobody@127.0.0.1:1/none")
        .unwrap();
    Database::from_pool(pool)
}

/// Truncate all tables to ensure test isolation.
pub async fn truncate_all_tables(pool: &sqlx::PgPool) {
    sqlx::raw_sql(
        "TRUNCATE TABLE rm_movie2genre, rm_movie, rm_genre, rm_content, rm_user, rm_game
         RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await
    .unwrap();
}

/// Ten movies (one without genres), twelve genres (`college` unused), five
/// content rows of which two are visible posts (`new-releases` written by
/// `doe`), and three users.
pub async fn seed(pool: &sqlx::PgPool) {
    sqlx::raw_sql(
        "INSERT INTO rm_movie (title, director, length, year, price, published) VALUES
          ('Pulp fiction', 'Quentin Tarantino', 154, 1994, 30, NOW()),
          ('American Pie', 'Paul Weitz', 95, 1999, 20, NOW()),
          ('Pokémon The Movie 2000', 'Kunihiko Yuyama', 99, 1999, 10, NOW()),
          ('Kopps', 'Josef Fares', 90, 2003, 20, NOW()),
          ('From Dusk Till Dawn', 'Robert Rodriguez', 108, 1996, 40, NOW()),
          ('The Shawshank Redemption', 'Frank Darabont', 142, 1994, 30, NOW()),
          ('Sagan om ringen', 'Peter Jackson', 178, 2001, 30, NOW()),
          ('Forrest Gump', 'Robert Zemeckis', 142, 1994, 20, NOW()),
          ('Alien', 'Ridley Scott', 117, 1979, 10, NOW()),
          ('Untitled short', NULL, 12, 2010, 15, NOW())",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::raw_sql(
        "INSERT INTO rm_genre (name) VALUES
          ('comedy'), ('romance'), ('college'),
          ('crime'), ('drama'), ('thriller'),
          ('animation'), ('adventure'), ('family'),
          ('svenskt'), ('action'), ('horror')",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::raw_sql(
        "INSERT INTO rm_movie2genre (id_movie, id_genre) VALUES
          (1, 4), (1, 6),
          (2, 1), (2, 2),
          (3, 7), (3, 9),
          (4, 1), (4, 10),
          (5, 11), (5, 12), (5, 6),
          (6, 5), (6, 4),
          (7, 8),
          (8, 5), (8, 2), (8, 1),
          (9, 12)",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::raw_sql(
        "INSERT INTO rm_content (slug, url, type, title, data, filter, author, published, updated) VALUES
          ('welcome', NULL, 'post', 'Welcome', 'The shop is open.', 'nl2br', 'admin',
           NOW() - INTERVAL '2 days', NOW() - INTERVAL '2 days'),
          ('new-releases', NULL, 'post', 'New releases', 'Ten new movies.', 'nl2br', 'doe',
           NOW() - INTERVAL '1 day', NOW() - INTERVAL '1 day'),
          ('coming-soon', NULL, 'post', 'Coming soon', 'Not yet.', 'nl2br', 'admin',
           NOW() + INTERVAL '1 day', NOW()),
          ('never', NULL, 'post', 'Draft', 'Unpublished.', 'nl2br', 'doe', NULL, NOW()),
          (NULL, 'about', 'page', 'About', 'About the shop.', 'nl2br', NULL,
           NOW() - INTERVAL '3 days', NOW() - INTERVAL '3 days')",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::raw_sql(
        "INSERT INTO rm_user (acronym, name, email, published, password, salt) VALUES
          ('admin', 'Administrator', 'admin@example.com', NOW(), 'x', 1),
          ('doe', 'John Doe', 'doe@example.com', NOW(), 'x', 2),
          ('dolly', 'Dolly Parton', NULL, NOW(), 'x', 3)",
    )
    .execute(pool)
    .await
    .unwrap();
}
