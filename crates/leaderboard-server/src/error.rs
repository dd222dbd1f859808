//! Error types for the leaderboard server.
//!
//! [`ServerError`] wraps every failure that stops the process. Anything
//! reaching `main` is fatal and exits non-zero.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: leaderboard_core::config::ConfigError,
    },

    /// Snapshot storage or recovery failed.
    #[error("snapshot error: {source}")]
    Snapshot {
        /// The underlying storage error.
        #[from]
        source: leaderboard_db::DbError,
    },

    /// NATS connection or stream setup failed.
    #[error("stream error: {source}")]
    Stream {
        /// The underlying consumer error.
        #[from]
        source: leaderboard_consumer::ConsumerError,
    },

    /// The query server could not bind or failed while serving.
    #[error("query server error: {source}")]
    Query {
        /// The underlying server error.
        #[from]
        source: leaderboard_query::ServerError,
    },

    /// A background task panicked or was cancelled.
    #[error("task {task} failed: {message}")]
    Task {
        /// Which task.
        task: &'static str,
        /// Join error description.
        message: String,
    },
}
