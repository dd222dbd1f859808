//! Error types for the persistence layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`], I/O and JSON errors with the snapshot location involved.

use std::path::PathBuf;

use leaderboard_core::{CoreError, RankingError};

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A snapshot could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored snapshot could not be decoded.
    #[error("Corrupt snapshot at {location}: {reason}")]
    Corrupt {
        /// Where the snapshot was read from.
        location: String,
        /// Decoder message.
        reason: String,
    },

    /// The snapshot could not be captured from the live store.
    #[error("Capture failed: {0}")]
    Capture(#[from] CoreError),

    /// A decoded snapshot could not be loaded into a store.
    #[error("Restore failed: {0}")]
    Restore(#[from] RankingError),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a later attempt of the same operation may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Postgres(_) => true,
            Self::Capture(e) => e.is_transient(),
            Self::Migration(_)
            | Self::Serialization(_)
            | Self::Corrupt { .. }
            | Self::Restore(_)
            | Self::Config(_) => false,
        }
    }
}
