//! Pipeline counters and the in-memory dead letter log.
//!
//! Counters are plain atomics so the consumer hot path never takes a lock
//! to record progress; the query server reads them for `/api/stats`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use leaderboard_types::DeadLetterRecord;
use tokio::sync::Mutex;

/// Default number of dead letters kept in memory.
pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 1_000;

/// Progress counters for the running process.
#[derive(Debug, Default)]
pub struct PipelineStats {
    events_received: AtomicU64,
    events_applied: AtomicU64,
    duplicates_skipped: AtomicU64,
    dead_letters: AtomicU64,
    /// Zero until the first snapshot; sequences start at one.
    last_snapshot_sequence: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCounters {
    /// Records pulled from the stream.
    pub events_received: u64,
    /// Records applied to the store.
    pub events_applied: u64,
    /// Redeliveries skipped.
    pub duplicates_skipped: u64,
    /// Records dead-lettered.
    pub dead_letters: u64,
    /// Last snapshot written or loaded.
    pub last_snapshot_sequence: Option<u64>,
}

impl PipelineStats {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A record was pulled from the stream.
    pub fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A record was applied.
    pub fn record_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// A redelivered record was skipped.
    pub fn record_duplicate(&self) {
        self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A record was dead-lettered.
    pub fn record_dead_letter(&self) {
        self.dead_letters.fetch_add(1, Ordering::Relaxed);
    }

    /// A snapshot with `sequence` was persisted or loaded.
    pub fn record_snapshot(&self, sequence: u64) {
        self.last_snapshot_sequence.fetch_max(sequence, Ordering::Release);
    }

    /// Read every counter.
    pub fn counters(&self) -> PipelineCounters {
        let last = self.last_snapshot_sequence.load(Ordering::Acquire);
        PipelineCounters {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            dead_letters: self.dead_letters.load(Ordering::Relaxed),
            last_snapshot_sequence: (last > 0).then_some(last),
        }
    }
}

/// Bounded log of the most recent dead letters.
#[derive(Debug)]
pub struct DeadLetterLog {
    capacity: usize,
    records: Mutex<VecDeque<DeadLetterRecord>>,
    total: AtomicU64,
}

impl Default for DeadLetterLog {
    fn default() -> Self {
        Self::new(DEFAULT_DEAD_LETTER_CAPACITY)
    }
}

impl DeadLetterLog {
    /// Keep at most `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            total: AtomicU64::new(0),
        }
    }

    /// Append a record, evicting the oldest when full.
    pub async fn push(&self, record: DeadLetterRecord) {
        let mut records = self.records.lock().await;
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Up to `limit` records, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<DeadLetterRecord> {
        let records = self.records.lock().await;
        records.iter().rev().take(limit).cloned().collect()
    }

    /// Dead letters recorded since start, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use leaderboard_types::DeadLetterKind;

    use super::*;

    fn record(offset: u64) -> DeadLetterRecord {
        DeadLetterRecord {
            kind: DeadLetterKind::Validation,
            reason: "bad".to_owned(),
            partition: "SCORES".to_owned(),
            offset,
            received_at: Utc::now(),
            payload: "{}".to_owned(),
        }
    }

    #[test]
    fn snapshot_sequence_is_monotonic() {
        let stats = PipelineStats::new();
        assert_eq!(stats.counters().last_snapshot_sequence, None);
        stats.record_snapshot(4);
        stats.record_snapshot(2);
        assert_eq!(stats.counters().last_snapshot_sequence, Some(4));
    }

    #[tokio::test]
    async fn log_keeps_newest_records() {
        let log = DeadLetterLog::new(3);
        for offset in 1..=5 {
            log.push(record(offset)).await;
        }
        let offsets: Vec<u64> = log.recent(10).await.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![5, 4, 3]);
        assert_eq!(log.total(), 5);
        assert_eq!(log.recent(1).await.len(), 1);
    }
}
