//! Background snapshot writer.
//!
//! Takes a snapshot when either trigger fires:
//!
//! - `snapshot.interval_ms` elapsed since the last tick, or
//! - the store revision moved `snapshot.dirty_threshold` past the last
//!   snapshot.
//!
//! A trigger with no new revision is skipped. When the lifecycle reaches
//! [`Phase::Finalizing`] the writer takes one last snapshot and exits.

use std::sync::Arc;
use std::time::Duration;

use leaderboard_core::config::SnapshotConfig;
use leaderboard_core::{Lifecycle, Phase, PipelineStats, RetryPolicy, SharedStore, with_retry};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::DbError;
use crate::store::SnapshotStore;

/// Where the writer resumes after recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterCursor {
    /// Sequence of the last persisted snapshot (0 if none).
    pub sequence: u64,
    /// Store revision captured by that snapshot.
    pub revision: u64,
}

/// Periodic and threshold-driven snapshot task.
pub struct SnapshotWriter {
    store: SharedStore,
    sink: Arc<dyn SnapshotStore>,
    lifecycle: Arc<Lifecycle>,
    stats: Arc<PipelineStats>,
    revisions: watch::Receiver<u64>,
    interval: Duration,
    dirty_threshold: u64,
    retry: RetryPolicy,
    cursor: WriterCursor,
}

impl SnapshotWriter {
    /// Create a writer resuming from `cursor`.
    pub fn new(
        store: SharedStore,
        sink: Arc<dyn SnapshotStore>,
        lifecycle: Arc<Lifecycle>,
        stats: Arc<PipelineStats>,
        config: &SnapshotConfig,
        cursor: WriterCursor,
    ) -> Self {
        let revisions = store.subscribe_revision();
        Self {
            store,
            sink,
            revisions,
            lifecycle,
            stats,
            interval: config.interval(),
            dirty_threshold: config.dirty_threshold.max(1),
            retry: RetryPolicy::default(),
            cursor,
        }
    }

    /// Override the retry policy for capture and write.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Last persisted position.
    pub const fn cursor(&self) -> WriterCursor {
        self.cursor
    }

    /// Take a snapshot unless nothing changed since the last one.
    ///
    /// Returns the new sequence, or `None` when skipped.
    ///
    /// # Errors
    ///
    /// Returns the last [`DbError`] once transient failures exhaust the
    /// retry policy, or the first permanent one.
    pub async fn snapshot_now(&mut self) -> Result<Option<u64>, DbError> {
        if self.store.revision() == self.cursor.revision {
            return Ok(None);
        }
        let sequence = self.cursor.sequence.saturating_add(1);

        let store = &self.store;
        let sink = &self.sink;
        let snapshot = with_retry(&self.retry, DbError::is_transient, || async move {
            let snapshot = store.capture(sequence).await?;
            sink.write(&snapshot).await?;
            Ok::<_, DbError>(snapshot)
        })
        .await
        .map_err(|e| match e {
            leaderboard_core::RetryError::Exhausted { last, .. }
            | leaderboard_core::RetryError::Permanent(last) => last,
        })?;

        self.cursor = WriterCursor {
            sequence,
            revision: snapshot.revision,
        };
        self.stats.record_snapshot(sequence);
        info!(
            sequence,
            revision = snapshot.revision,
            entities = snapshot.entries.len(),
            location = %self.sink.describe(),
            "Snapshot written"
        );
        Ok(Some(sequence))
    }

    async fn snapshot_logged(&mut self) {
        if let Err(e) = self.snapshot_now().await {
            warn!(error = %e, "Snapshot failed, will retry on next trigger");
        }
    }

    /// Run until the lifecycle reaches [`Phase::Finalizing`], then write the
    /// final snapshot.
    ///
    /// # Errors
    ///
    /// Returns the error of the final snapshot; periodic failures are logged
    /// and retried on the next trigger.
    pub async fn run(mut self) -> Result<WriterCursor, DbError> {
        let lifecycle = Arc::clone(&self.lifecycle);
        let mut revisions = self.revisions.clone();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            dirty_threshold = self.dirty_threshold,
            "Snapshot writer started"
        );

        loop {
            tokio::select! {
                biased;
                () = lifecycle.reached(Phase::Finalizing) => break,
                _ = ticker.tick() => self.snapshot_logged().await,
                changed = revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let revision = *revisions.borrow_and_update();
                    if revision.saturating_sub(self.cursor.revision) >= self.dirty_threshold {
                        self.snapshot_logged().await;
                        ticker.reset();
                    }
                }
            }
        }

        match self.snapshot_now().await {
            Ok(Some(sequence)) => info!(sequence, "Final snapshot written"),
            Ok(None) => info!(sequence = self.cursor.sequence, "No changes since last snapshot"),
            Err(e) => {
                error!(error = %e, "Final snapshot failed");
                return Err(e);
            }
        }
        Ok(self.cursor)
    }
}
