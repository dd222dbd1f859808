//! Durable snapshot format.
//!
//! A snapshot is an immutable, point-in-time serialization of the ranking
//! state together with the stream offsets it reflects. Snapshots are
//! identified by a monotonically increasing `sequence` and tagged with a
//! format string so that readers can refuse layouts they do not know.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::score::ScoreEntry;

/// Format tag written into every snapshot produced by this version.
pub const SNAPSHOT_FORMAT: &str = "leaderboard-snapshot/v1";

/// Serialized ranking state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Layout tag, see [`SNAPSHOT_FORMAT`].
    pub format: String,
    /// Monotonic snapshot number.
    pub sequence: u64,
    /// Store revision at capture time.
    pub revision: u64,
    /// Wall-clock capture time.
    pub captured_at: DateTime<Utc>,
    /// Last committed offset per stream partition.
    pub offsets: BTreeMap<String, u64>,
    /// All entries in ranked order.
    pub entries: Vec<ScoreEntry>,
    /// Activity sketch state, absent in snapshots written without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<SketchState>,
}

impl SnapshotFile {
    /// Whether this build can read the snapshot's layout.
    pub fn is_supported(&self) -> bool {
        self.format == SNAPSHOT_FORMAT
    }
}

/// Raw counters of a count-min sketch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SketchState {
    /// Number of counters per row.
    pub width: usize,
    /// Number of rows (hash functions).
    pub depth: usize,
    /// `depth` rows of `width` counters.
    pub counters: Vec<Vec<u64>>,
}
