//! # Main — CLI Entry Point
//!
//! Routes CLI subcommands to the site server, the catalogue listings and an
//! offline Dice 100 game. Handles shared concerns: `.env` loading, logging
//! set-up and the database connection.
//!
//! ## Subcommands
//!
//! `serve` starts the JSON API. `movies`, `news`, `users` and `scoreboard`
//! print listings straight from the database. `dice` plays a scripted game
//! in the terminal and needs no database.
//!
//! ## Global Options
//!
//! - `--database-url` / `DATABASE_URL`: PostgreSQL connection.
//! - `--hits` / `RM_DEFAULT_HITS`: page size for listings (default 8).
//! - `--scoreboard-size` / `RM_SCOREBOARD_SIZE`: scoreboard length (default 5).
//! - `--json`: print listings as JSON instead of tables.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::net::IpAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rentalmovies", about = "Rental Movies site backend and tools")]
struct Cli {
    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Rows per page for movie and user listings
    #[arg(long, env = "RM_DEFAULT_HITS", default_value_t = 8, global = true)]
    hits: u32,

    /// Number of entries on the Dice 100 scoreboard
    #[arg(long, env = "RM_SCOREBOARD_SIZE", default_value_t = 5, global = true)]
    scoreboard_size: i64,

    /// Print listings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the JSON API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 7001)]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        /// Seconds a visitor session may sit idle before it is dropped
        #[arg(long, env = "RM_SESSION_TTL", default_value_t = 1440)]
        session_ttl: u64,
        /// Most visitor sessions kept in memory
        #[arg(long, env = "RM_MAX_SESSIONS", default_value_t = 10_000)]
        max_sessions: usize,
    },
    /// Search the movie catalogue
    Movies {
        /// Movie id
        #[arg(long)]
        id: Option<String>,
        /// Title pattern, `%` matches anything
        #[arg(long)]
        title: Option<String>,
        /// Earliest production year
        #[arg(long)]
        year1: Option<String>,
        /// Latest production year
        #[arg(long)]
        year2: Option<String>,
        /// Genre name
        #[arg(long)]
        genre: Option<String>,
        /// Page number (1-based)
        #[arg(long)]
        page: Option<String>,
        /// Sort column: id, title, year or price
        #[arg(long)]
        orderby: Option<String>,
        /// Sort order: asc or desc
        #[arg(long)]
        order: Option<String>,
    },
    /// List published news posts, or show one post
    News {
        /// Post slug
        #[arg(long)]
        slug: Option<String>,
        /// Page number (1-based)
        #[arg(long)]
        page: Option<String>,
    },
    /// Search user accounts
    Users {
        /// Acronym pattern, `%` matches anything
        #[arg(long)]
        acronym: Option<String>,
        /// Name pattern, `%` matches anything
        #[arg(long)]
        name: Option<String>,
        /// Page number (1-based)
        #[arg(long)]
        page: Option<String>,
        /// Sort column: id, acronym or name
        #[arg(long)]
        orderby: Option<String>,
        /// Sort order: asc or desc
        #[arg(long)]
        order: Option<String>,
    },
    /// Show the Dice 100 scoreboard
    Scoreboard,
    /// Play Dice 100 in the terminal
    Dice {
        /// Actions to take in order: r = roll, b = bank, n = new game
        #[arg(long, default_value = "rrrrb")]
        script: String,
        /// Seed for the die, for repeatable games
        #[arg(long)]
        seed: Option<u64>,
        /// Fixed faces to use for the rolls instead of a random die
        #[arg(long, value_delimiter = ',')]
        faces: Vec<u8>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize structured logging: LOG_FORMAT=json for containers, human-readable otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { port, bind, .. } => {
            let database_url = cli::require_database_url(&cli)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(rentalmovies::site::run(
                std::net::SocketAddr::new(*bind, *port),
                database_url,
                cli::site_config(&cli),
            ))
        }
        Commands::Dice {
            script,
            seed,
            faces,
        } => cli::run_dice(script, *seed, faces, cli.json),
        _ => cli::run_listing(&cli),
    }
}
