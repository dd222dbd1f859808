//! Core logic for the leaderboard service.
//!
//! This crate contains the ranking store, the activity sketch, and the
//! runtime primitives (retry, lifecycle, counters) shared by the consumer,
//! snapshot writer, and query server.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod ranking;
pub mod retry;
pub mod sketch;
pub mod stats;

pub use config::LeaderboardConfig;
pub use error::{CoreError, RankingError};
pub use lifecycle::{Lifecycle, Phase};
pub use ranking::{ApplyOutcome, RankingStore, ScoreUpdate, SharedStore, StoreSettings};
pub use retry::{RetryError, RetryPolicy, with_retry};
pub use sketch::CountMinSketch;
pub use stats::{DeadLetterLog, PipelineStats};
