//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Contains the
//! execution logic for the listing subcommands and the terminal dice game.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rentalmovies::db::movies::MovieFilter;
use rentalmovies::db::news::{self, NewsFilter};
use rentalmovies::db::users::UserFilter;
use rentalmovies::db::Database;
use rentalmovies::dice::{DiceGame, Player, RandomDie};
use rentalmovies::search::{Row, SearchResult};
use rentalmovies::site::SiteConfig;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use super::{Cli, Commands};

pub fn require_database_url(cli: &Cli) -> Result<&str> {
    cli.database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required (set via --database-url or env)"))
}

pub fn site_config(cli: &Cli) -> SiteConfig {
    let mut config = SiteConfig {
        default_hits: cli.hits,
        scoreboard_size: cli.scoreboard_size,
        ..SiteConfig::default()
    };
    if let Commands::Serve {
        session_ttl,
        max_sessions,
        ..
    } = &cli.command
    {
        config.session_ttl = Duration::from_secs(*session_ttl);
        config.max_sessions = *max_sessions;
    }
    config
}

// ── Listings ────────────────────────────────────────────────────

/// Run `movies`, `news`, `users` or `scoreboard`.
///
/// Filters are validated before connecting, so bad arguments fail fast
/// even when the database is down.
pub fn run_listing(cli: &Cli) -> Result<()> {
    let hits = Some(cli.hits);
    let search = match &cli.command {
        Commands::Movies {
            id,
            title,
            year1,
            year2,
            genre,
            page,
            orderby,
            order,
        } => Some(
            MovieFilter {
                id: id.clone(),
                title: title.clone(),
                year1: year1.clone(),
                year2: year2.clone(),
                genre: genre.clone(),
                hits: None,
                page: page.clone(),
                orderby: orderby.clone(),
                order: order.clone(),
            }
            .to_search(hits)?,
        ),
        Commands::News { slug: None, page } => Some(
            NewsFilter {
                slug: None,
                hits: None,
                page: page.clone(),
            }
            .to_search(news::DEFAULT_HITS)?,
        ),
        Commands::Users {
            acronym,
            name,
            page,
            orderby,
            order,
        } => Some(
            UserFilter {
                acronym: acronym.clone(),
                name: name.clone(),
                page: page.clone(),
                orderby: orderby.clone(),
                order: order.clone(),
                ..Default::default()
            }
            .to_search(hits)?,
        ),
        Commands::News { slug: Some(_), .. } | Commands::Scoreboard => None,
        Commands::Serve { .. } | Commands::Dice { .. } => bail!("not a listing command"),
    };

    let database_url = require_database_url(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    let database = rt
        .block_on(Database::connect(database_url))
        .context("failed to connect to the database")?;

    if let Some(search) = search {
        let result = rt.block_on(search.search(&database))?;
        info!(total = result.total_count, "listing fetched");
        let columns: &[&str] = match cli.command {
            Commands::Movies { .. } => &["id", "title", "year", "genre", "price"],
            Commands::Users { .. } => &["id", "acronym", "name", "email"],
            _ => &["slug", "title", "published"],
        };
        return print_result(&result, columns, cli.json);
    }

    match &cli.command {
        Commands::News {
            slug: Some(slug), ..
        } => {
            let post = rt.block_on(news::find_post(&database, slug))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&post)?);
            } else {
                println!("{}", cell(&post, "title"));
                println!("{}", cell(&post, "published"));
                println!();
                println!("{}", cell(&post, "data"));
            }
        }
        Commands::Scoreboard => {
            let entries = rt.block_on(database.top_scores(cli.scoreboard_size))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No scores yet");
            } else {
                println!("{:<4} {:<12} {:<30} {:>6}", "#", "ACRONYM", "NAME", "POINTS");
                for (rank, e) in entries.iter().enumerate() {
                    println!(
                        "{:<4} {:<12} {:<30} {:>6}",
                        rank + 1,
                        e.acronym,
                        e.name,
                        e.points
                    );
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Show one row field as plain text; strings unquoted, null as `-`.
fn cell(row: &Row, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn print_result(result: &SearchResult, columns: &[&str], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    if result.is_empty() {
        println!("No matches");
        return Ok(());
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| columns.iter().map(|c| cell(row, c)).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<String>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };
    println!("{}", line(columns.iter().map(|c| c.to_uppercase()).collect()));
    for row in cells {
        println!("{}", line(row));
    }

    match result.max_pages() {
        Some(pages) => println!(
            "\npage {} of {} ({} matches)",
            result.page.page, pages, result.total_count
        ),
        None => println!("\n{} matches", result.total_count),
    }
    Ok(())
}

// ── Dice ────────────────────────────────────────────────────────

/// Play a guest game of Dice 100 following `script`.
///
/// With `faces` the rolls use those faces in order; otherwise a die seeded
/// from `seed` (or the OS) is rolled.
pub fn run_dice(script: &str, seed: Option<u64>, faces: &[u8], json: bool) -> Result<()> {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut die = RandomDie::with_rng(rng);
    let scripted = !faces.is_empty();
    let mut faces = faces.iter().copied();
    let mut game = DiceGame::new();

    for action in script.chars().filter(|c| !c.is_whitespace() && *c != ',') {
        match action.to_ascii_lowercase() {
            'r' if game.has_finished() => {
                println!("game over, start a new one with n");
                continue;
            }
            'r' => {
                let face = if scripted {
                    let face = faces.next().context("ran out of faces")?;
                    if !game.apply_face(face, Player::Guest) {
                        println!("ignored face {face}");
                        continue;
                    }
                    face
                } else {
                    match game.roll(&mut die, Player::Guest) {
                        Some(face) => face,
                        None => continue,
                    }
                };
                println!(
                    "roll {face}: accumulated {} saved {} points {}",
                    game.accumulated(),
                    game.saved(),
                    game.points()
                );
                if let Some(message) = game.message() {
                    println!("{message}");
                }
            }
            'b' => {
                if game.bank_score() {
                    println!("bank: saved {} points {}", game.saved(), game.points());
                } else {
                    println!("nothing to bank");
                }
            }
            'n' => {
                game.new_game();
                println!("new game");
            }
            other => bail!("unknown action '{other}', use r (roll), b (bank) or n (new game)"),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&game)?);
    } else {
        println!(
            "accumulated {} saved {} points {}{}",
            game.accumulated(),
            game.saved(),
            game.points(),
            if game.has_finished() { " (finished)" } else { "" }
        );
    }
    Ok(())
}
