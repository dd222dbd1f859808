//! The consume loop: pull, decode, apply, commit.
//!
//! Each record is handled to completion before the next is pulled, so
//! updates reach the store in stream order. A record ends in exactly one
//! of three ways:
//!
//! 1. applied (or skipped as a redelivery) and its offset committed,
//! 2. dead-lettered as `validation` when it cannot be decoded or the store
//!    rejects it, with its offset committed so it is not replayed,
//! 3. dead-lettered as `retries_exhausted` when the store stays busy.
//!
//! The loop stops pulling once the lifecycle enters [`Phase::Draining`];
//! the record in flight at that moment is finished first.

use std::sync::Arc;

use chrono::Utc;
use leaderboard_core::{
    ApplyOutcome, CoreError, DeadLetterLog, Lifecycle, Phase, PipelineStats, RetryError,
    RetryPolicy, SharedStore, with_retry,
};
use leaderboard_types::DeadLetterRecord;
use tracing::{debug, info, warn};

use crate::decode::{decode, preview};
use crate::error::ProcessError;
use crate::nats::NatsClient;
use crate::source::{EventSource, StreamRecord};

fn retry_failed(e: RetryError<CoreError>) -> ProcessError {
    match e {
        RetryError::Permanent(e) => ProcessError::Rejected(e),
        RetryError::Exhausted { attempts, last } => ProcessError::Exhausted { attempts, last },
    }
}

/// Drives one [`EventSource`] into the ranking store.
pub struct EventConsumer<S> {
    source: S,
    store: SharedStore,
    stats: Arc<PipelineStats>,
    dead_letters: Arc<DeadLetterLog>,
    forward: Option<NatsClient>,
    lifecycle: Arc<Lifecycle>,
    retry: RetryPolicy,
}

impl<S: EventSource> EventConsumer<S> {
    /// Create a consumer with the default retry policy.
    pub fn new(
        source: S,
        store: SharedStore,
        stats: Arc<PipelineStats>,
        dead_letters: Arc<DeadLetterLog>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            source,
            store,
            stats,
            dead_letters,
            forward: None,
            lifecycle,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy for store writes.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Republish dead letters through `nats`.
    #[must_use]
    pub fn with_forwarding(mut self, nats: NatsClient) -> Self {
        self.forward = Some(nats);
        self
    }

    /// The wrapped source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Run until the lifecycle starts draining or the source closes.
    ///
    /// Pull errors are logged and retried with the consumer backoff; they
    /// never end the loop. Returns the source so callers can inspect it.
    pub async fn run(mut self) -> S {
        let lifecycle = Arc::clone(&self.lifecycle);
        let mut failures: u32 = 0;
        info!("Event consumer started");

        loop {
            let next = tokio::select! {
                biased;
                () = lifecycle.reached(Phase::Draining) => {
                    info!("Draining, event consumer stopping");
                    break;
                }
                next = self.source.next() => next,
            };

            match next {
                Ok(Some(record)) => {
                    failures = 0;
                    self.handle(record).await;
                }
                Ok(None) => {
                    info!("Event source closed");
                    break;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.retry.delay(failures);
                    warn!(
                        error = %e,
                        consecutive_failures = failures,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Failed to pull from event source"
                    );
                    tokio::select! {
                        biased;
                        () = lifecycle.reached(Phase::Draining) => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        let counters = self.stats.counters();
        info!(
            received = counters.events_received,
            applied = counters.events_applied,
            duplicates = counters.duplicates_skipped,
            dead_letters = counters.dead_letters,
            "Event consumer stopped"
        );
        self.source
    }

    /// Decode and apply one record.
    ///
    /// A record at or before the committed offset is reported as
    /// [`ApplyOutcome::Duplicate`] without being decoded, so a redelivered
    /// malformed record is not dead-lettered twice.
    ///
    /// # Errors
    ///
    /// Returns the [`ProcessError`] that decides the record's dead letter
    /// class.
    pub async fn process(&self, record: &StreamRecord) -> Result<ApplyOutcome, ProcessError> {
        let store = &self.store;
        let position = &record.position;

        let committed = with_retry(&self.retry, CoreError::is_transient, || {
            store.is_committed(position)
        })
        .await
        .map_err(retry_failed)?;
        if committed {
            return Ok(ApplyOutcome::Duplicate);
        }

        let update = decode(&record.payload)?;
        with_retry(&self.retry, CoreError::is_transient, || {
            store.apply_update(&update, position)
        })
        .await
        .map_err(retry_failed)
    }

    async fn handle(&mut self, record: StreamRecord) {
        self.stats.record_received();

        match self.process(&record).await {
            Ok(ApplyOutcome::Applied { previous, score }) => {
                self.stats.record_applied();
                debug!(
                    position = %record.position,
                    previous = previous.unwrap_or_default(),
                    score,
                    "Applied score update"
                );
            }
            Ok(ApplyOutcome::Duplicate) => {
                self.stats.record_duplicate();
                debug!(position = %record.position, "Skipped redelivered record");
            }
            Err(e) => self.dead_letter(&record, &e).await,
        }

        if let Err(e) = self.source.commit(&record.position).await {
            warn!(position = %record.position, error = %e, "Failed to commit record");
        }
    }

    async fn dead_letter(&self, record: &StreamRecord, error: &ProcessError) {
        let dead = DeadLetterRecord {
            kind: error.kind(),
            reason: error.to_string(),
            partition: record.position.partition.clone(),
            offset: record.position.offset,
            received_at: Utc::now(),
            payload: preview(&record.payload),
        };
        warn!(
            position = %record.position,
            kind = %dead.kind,
            reason = dead.reason,
            "Record dead-lettered"
        );
        if let Some(nats) = &self.forward {
            nats.publish_dead_letter(&dead).await;
        }
        self.dead_letters.push(dead).await;
        self.stats.record_dead_letter();

        let store = &self.store;
        let position = &record.position;
        if let Err(e) = with_retry(&self.retry, CoreError::is_transient, || {
            store.commit_offset(position)
        })
        .await
        {
            warn!(
                position = %record.position,
                error = %e,
                "Failed to commit dead-lettered offset, record may be replayed"
            );
        }
    }
}

impl<S> std::fmt::Debug for EventConsumer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventConsumer")
            .field("retry", &self.retry)
            .field("forwarding", &self.forward.is_some())
            .finish_non_exhaustive()
    }
}
