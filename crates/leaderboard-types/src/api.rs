//! Request and response bodies of the query API.
//!
//! Shared between the query server and the CLI so both sides agree on the
//! JSON layout. Exported to `TypeScript` for dashboard consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::EntityId;

/// One row of a ranked listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RankedEntry {
    /// 1-based rank.
    pub rank: u64,
    /// The ranked entity.
    pub entity_id: EntityId,
    /// Current score.
    pub score: i64,
    /// Time of the most recent update.
    pub last_updated: DateTime<Utc>,
}

/// Body of `GET /api/rank/{entity_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RankResponse {
    /// The requested entity.
    pub entity_id: EntityId,
    /// Current score.
    pub score: i64,
    /// 1-based rank.
    pub rank: u64,
    /// Number of ranked entities.
    pub total: u64,
    /// Share of entities ranked at or below this one, in percent.
    pub percentile: f64,
    /// Time of the most recent update.
    pub last_updated: DateTime<Utc>,
}

/// Body of `GET /api/top`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TopResponse {
    /// 0-based offset of the first entry.
    pub offset: u64,
    /// Number of entries returned.
    pub count: u64,
    /// Total number of ranked entities.
    pub total: u64,
    /// Entries in ranked order.
    pub entries: Vec<RankedEntry>,
}

/// One row of the approximate activity leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActivityEntry {
    /// The entity.
    pub entity_id: EntityId,
    /// Estimated number of applied updates (never an underestimate).
    pub estimated_updates: u64,
}

/// Body of `GET /api/activity/top`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActivityResponse {
    /// Number of entries returned.
    pub count: u64,
    /// Entries by descending estimate, ties by entity id.
    pub entries: Vec<ActivityEntry>,
}

/// Body of `GET /api/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StatsResponse {
    /// Number of ranked entities.
    pub entities: u64,
    /// Store revision; bumps on every upsert and standalone offset commit.
    pub revision: u64,
    /// Records pulled from the stream by this process.
    pub events_received: u64,
    /// Records applied to the store by this process.
    pub events_applied: u64,
    /// Redelivered records skipped because their offset was already committed.
    pub duplicates_skipped: u64,
    /// Records routed to the dead letter sink by this process.
    pub dead_letters: u64,
    /// Sequence of the last snapshot written or loaded.
    #[ts(optional)]
    pub last_snapshot_sequence: Option<u64>,
    /// Current lifecycle phase.
    pub phase: String,
}

/// Why a record was dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DeadLetterKind {
    /// The record was malformed or its score was rejected.
    Validation,
    /// The store stayed unavailable through every retry.
    RetriesExhausted,
}

impl core::fmt::Display for DeadLetterKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Validation => f.write_str("validation"),
            Self::RetriesExhausted => f.write_str("retries_exhausted"),
        }
    }
}

/// A record that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DeadLetterRecord {
    /// Failure class.
    pub kind: DeadLetterKind,
    /// Human-readable failure description.
    pub reason: String,
    /// Partition the record came from.
    pub partition: String,
    /// Offset of the record.
    pub offset: u64,
    /// When the consumer gave up on the record.
    pub received_at: DateTime<Utc>,
    /// Leading bytes of the payload, lossily decoded as UTF-8.
    pub payload: String,
}

/// Body of `GET /api/dead-letters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DeadLettersResponse {
    /// Total dead letters since start, including evicted ones.
    pub total: u64,
    /// Most recent dead letters, newest first.
    pub records: Vec<DeadLetterRecord>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthResponse {
    /// `ok` while serving, `draining` during shutdown.
    pub status: String,
}
