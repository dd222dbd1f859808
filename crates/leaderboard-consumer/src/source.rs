//! Abstraction over the ordered record stream.

use std::collections::VecDeque;

use async_trait::async_trait;
use leaderboard_types::StreamPosition;

use crate::error::ConsumerError;

/// One raw record pulled from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// Where the record sits in the stream.
    pub position: StreamPosition,
    /// Undecoded payload.
    pub payload: Vec<u8>,
}

/// An ordered, at-least-once source of [`StreamRecord`]s.
///
/// Offsets within a partition are strictly increasing. A record that is
/// not acknowledged may be delivered again.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next record. `Ok(None)` means the source is closed.
    async fn next(&mut self) -> Result<Option<StreamRecord>, ConsumerError>;

    /// Acknowledge the record at `position` once its outcome is final.
    async fn commit(&mut self, position: &StreamPosition) -> Result<(), ConsumerError>;
}

/// In-memory source for tests and local replay.
#[derive(Debug, Default)]
pub struct MemorySource {
    partition: String,
    next_offset: u64,
    queued: VecDeque<StreamRecord>,
    committed: Vec<StreamPosition>,
    hold_open: bool,
}

impl MemorySource {
    /// Empty source for `partition`; the first pushed record gets offset 1.
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            next_offset: 1,
            ..Self::default()
        }
    }

    /// Source pre-filled with `payloads` at offsets `1..`.
    pub fn from_payloads<I, P>(partition: impl Into<String>, payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        let mut source = Self::new(partition);
        for payload in payloads {
            source.push(payload);
        }
        source
    }

    /// Keep `next` pending once drained instead of reporting the source closed.
    #[must_use]
    pub const fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Drop records at or before `offset`, as a resumed consumer would.
    #[must_use]
    pub fn resume_after(mut self, offset: u64) -> Self {
        self.queued.retain(|r| r.position.offset > offset);
        self
    }

    /// Append a record at the next offset.
    pub fn push(&mut self, payload: impl Into<Vec<u8>>) -> StreamPosition {
        let position = StreamPosition::new(self.partition.clone(), self.next_offset);
        self.next_offset = self.next_offset.saturating_add(1);
        self.queued.push_back(StreamRecord {
            position: position.clone(),
            payload: payload.into(),
        });
        position
    }

    /// Append a record at an explicit position (for redelivery scenarios).
    pub fn push_at(&mut self, position: StreamPosition, payload: impl Into<Vec<u8>>) {
        self.queued.push_back(StreamRecord {
            position,
            payload: payload.into(),
        });
    }

    /// Positions committed so far, in order.
    pub fn committed(&self) -> &[StreamPosition] {
        &self.committed
    }
}

#[async_trait]
impl EventSource for MemorySource {
    async fn next(&mut self) -> Result<Option<StreamRecord>, ConsumerError> {
        if let Some(record) = self.queued.pop_front() {
            return Ok(Some(record));
        }
        if self.hold_open {
            std::future::pending::<()>().await;
        }
        Ok(None)
    }

    async fn commit(&mut self, position: &StreamPosition) -> Result<(), ConsumerError> {
        self.committed.push(position.clone());
        Ok(())
    }
}
