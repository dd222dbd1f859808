//! Error types for the ranking store and its shared handle.

use leaderboard_types::EntityId;

use crate::sketch::SketchError;

/// Errors raised by [`RankingStore`](crate::ranking::RankingStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankingError {
    /// The score lies outside the configured range.
    #[error("score {score} outside valid range [{min}, {max}]")]
    InvalidScore {
        /// Rejected score.
        score: i64,
        /// Configured minimum.
        min: i64,
        /// Configured maximum.
        max: i64,
    },

    /// No entry exists for the entity.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// An increment would overflow the score.
    #[error("score overflow for entity {entity_id}")]
    ScoreOverflow {
        /// Entity whose score overflowed.
        entity_id: EntityId,
    },

    /// The snapshot layout tag is not one this build reads.
    #[error("unsupported snapshot format: {format}")]
    UnsupportedSnapshot {
        /// The tag found in the snapshot.
        format: String,
    },

    /// The snapshot is internally inconsistent.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Sketch state in the snapshot could not be restored.
    #[error("invalid snapshot sketch: {0}")]
    Sketch(#[from] SketchError),
}

impl RankingError {
    /// Whether the error is caused by the update itself and will never succeed on retry.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidScore { .. } | Self::ScoreOverflow { .. })
    }
}

/// Errors raised through [`SharedStore`](crate::ranking::SharedStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The store lock was not acquired within the timeout.
    #[error("ranking store busy: lock not acquired within {waited_ms} ms")]
    StoreBusy {
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// The store rejected the operation.
    #[error(transparent)]
    Ranking(#[from] RankingError),
}

impl CoreError {
    /// Whether retrying the same operation may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreBusy { .. })
    }
}
