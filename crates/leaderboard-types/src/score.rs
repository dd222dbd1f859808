//! Score entries and update semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::EntityId;

/// The live score of one entity.
///
/// At most one entry exists per [`EntityId`]. `last_updated` is the event
/// time of the update that produced `score`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScoreEntry {
    /// The entity this score belongs to.
    pub entity_id: EntityId,
    /// Current score.
    pub score: i64,
    /// Time of the most recent update.
    pub last_updated: DateTime<Utc>,
}

/// How an incoming score is combined with the stored one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum UpdateMode {
    /// The incoming score replaces the stored score.
    #[default]
    Overwrite,
    /// The incoming score is added to the stored score.
    Increment,
}

impl core::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Increment => f.write_str("increment"),
        }
    }
}
