//! Score-update records carried on the event stream.
//!
//! The wire format is strict JSON: unknown fields are rejected and the
//! entity id is validated during deserialization, so a record either
//! decodes into a well-formed [`ScoreEvent`] or is routed to the dead
//! letter sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::ids::EntityId;

/// A single score update published by a producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(deny_unknown_fields)]
#[ts(export, export_to = "bindings/")]
pub struct ScoreEvent {
    /// The entity whose score changes.
    pub entity_id: EntityId,
    /// New score (or delta, in increment mode).
    pub score: i64,
    /// When the producer observed the score.
    pub event_time: DateTime<Utc>,
    /// Producer-assigned message id, sent as the broker dedup key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message_id: Option<Uuid>,
}

impl ScoreEvent {
    /// Build an event stamped with the current time and a fresh message id.
    pub fn new(entity_id: EntityId, score: i64) -> Self {
        Self {
            entity_id,
            score,
            event_time: Utc::now(),
            message_id: Some(Uuid::now_v7()),
        }
    }
}

/// Location of a record within the event stream.
///
/// Offsets are strictly increasing within a partition. Ordering across
/// partitions is not defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StreamPosition {
    /// Partition (stream) name.
    pub partition: String,
    /// Offset within the partition.
    pub offset: u64,
}

impl StreamPosition {
    /// Create a position.
    pub fn new(partition: impl Into<String>, offset: u64) -> Self {
        Self {
            partition: partition.into(),
            offset,
        }
    }
}

impl core::fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}
