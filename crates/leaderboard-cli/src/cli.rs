//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Default query server address.
pub const DEFAULT_URL: &str = "http://localhost:8080";

/// Publish score events and query a running leaderboard.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Base URL of the query server.
    #[arg(long, env = "LEADERBOARD_URL", default_value = DEFAULT_URL, global = true)]
    pub url: String,

    /// Configuration file used for the NATS connection when publishing.
    #[arg(long, env = "LEADERBOARD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Publish one score update to the event stream.
    Publish {
        /// Entity whose score changes.
        entity_id: String,
        /// New score, or delta in increment mode.
        #[arg(allow_negative_numbers = true)]
        score: i64,
    },
    /// Show the rank of one entity.
    Rank {
        /// Entity to look up.
        entity_id: String,
    },
    /// Show the top of the leaderboard.
    Top {
        /// Number of entries.
        #[arg(short, long, default_value_t = 10)]
        k: usize,
        /// Skip this many entries (exact mode only).
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Exact score ranking or approximate activity ranking.
        #[arg(long, value_enum, default_value_t = TopMode::Exact)]
        mode: TopMode,
    },
    /// Show pipeline counters.
    Stats,
    /// Show the most recent dead letters.
    DeadLetters {
        /// Maximum number of records.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

/// Which leaderboard `top` reads.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopMode {
    /// Exact ranking by score.
    Exact,
    /// Approximate ranking by update count (count-min sketch).
    Approximate,
}
