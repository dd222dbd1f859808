//! Process assembly and the shutdown sequence.
//!
//! ```text
//! recover ─▶ [query] [writer] [consumer] ─ signal ─▶ Draining
//!   consumer finishes its record, query drains ─▶ Finalizing
//!   writer takes the final snapshot ─▶ Stopped
//! ```

use std::future::Future;
use std::sync::Arc;

use leaderboard_consumer::{EventConsumer, EventSource, NatsClient};
use leaderboard_core::stats::PipelineCounters;
use leaderboard_core::{
    DeadLetterLog, LeaderboardConfig, Lifecycle, PipelineStats, RetryPolicy, SharedStore,
    StoreSettings,
};
use leaderboard_db::{SnapshotStore, SnapshotWriter, WriterCursor, recover};
use leaderboard_query::AppState;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::error::ServerError;

fn task_failed(task: &'static str, e: &JoinError) -> ServerError {
    ServerError::Task {
        task,
        message: e.to_string(),
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Position of the final snapshot.
    pub cursor: WriterCursor,
    /// Pipeline counters at shutdown.
    pub counters: PipelineCounters,
}

/// A recovered store and the components sharing it, ready to run.
pub struct Pipeline {
    config: LeaderboardConfig,
    sink: Arc<dyn SnapshotStore>,
    store: SharedStore,
    stats: Arc<PipelineStats>,
    dead_letters: Arc<DeadLetterLog>,
    lifecycle: Arc<Lifecycle>,
    cursor: WriterCursor,
}

impl Pipeline {
    /// Open `storage.location` and recover from its latest snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Snapshot`] if the location is unusable or the
    /// latest snapshot cannot be restored.
    pub async fn open(config: LeaderboardConfig) -> Result<Self, ServerError> {
        let sink = leaderboard_db::open(&config.storage.location).await?;
        Self::recover(config, sink).await
    }

    /// Recover from the latest snapshot in `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Snapshot`] if the latest snapshot cannot be
    /// read or restored.
    pub async fn recover(
        config: LeaderboardConfig,
        sink: Arc<dyn SnapshotStore>,
    ) -> Result<Self, ServerError> {
        let recovered = recover(sink.as_ref(), StoreSettings::from_config(&config)).await?;
        let stats = Arc::new(PipelineStats::new());
        if recovered.cursor.sequence > 0 {
            stats.record_snapshot(recovered.cursor.sequence);
        }
        info!(
            entities = recovered.store.len(),
            sequence = recovered.cursor.sequence,
            revision = recovered.cursor.revision,
            location = %sink.describe(),
            "Store recovered"
        );

        let store = SharedStore::new(
            recovered.store,
            config.query.timeout(),
            config.consumer.lock_timeout(),
        );
        Ok(Self {
            sink,
            store,
            stats,
            dead_letters: Arc::new(DeadLetterLog::default()),
            lifecycle: Arc::new(Lifecycle::new()),
            cursor: recovered.cursor,
            config,
        })
    }

    /// The shared store.
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The process lifecycle.
    pub const fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Last committed offset of `partition`, or `None` if nothing was read yet.
    pub async fn committed_offset(&self, partition: &str) -> Option<u64> {
        self.store
            .read()
            .await
            .ok()
            .and_then(|store| store.offsets().get(partition).copied())
    }

    /// State handed to the query handlers.
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(
            self.store.clone(),
            Arc::clone(&self.stats),
            Arc::clone(&self.dead_letters),
            Arc::clone(&self.lifecycle),
        ))
    }

    /// Run every task until `shutdown` resolves, the source closes, or the
    /// query server exits, then drain, take the final snapshot, and stop.
    ///
    /// `listener` is optional so the pipeline can run headless. Dead letters
    /// forwarded through `forward` are flushed once the consumer has stopped.
    ///
    /// # Errors
    ///
    /// Returns the first fatal task error: a query server failure, the final
    /// snapshot failing, or a task panicking.
    pub async fn run<S, F>(
        self,
        source: S,
        listener: Option<TcpListener>,
        forward: Option<NatsClient>,
        shutdown: F,
    ) -> Result<RunSummary, ServerError>
    where
        S: EventSource + Sync + 'static,
        F: Future<Output = ()>,
    {
        let lifecycle = Arc::clone(&self.lifecycle);

        let mut query = listener.map(|listener| {
            tokio::spawn(leaderboard_query::serve(listener, self.app_state()))
        });

        let writer = SnapshotWriter::new(
            self.store.clone(),
            Arc::clone(&self.sink),
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.stats),
            &self.config.snapshot,
            self.cursor,
        );
        let writer = tokio::spawn(writer.run());

        let mut consumer = EventConsumer::new(
            source,
            self.store.clone(),
            Arc::clone(&self.stats),
            Arc::clone(&self.dead_letters),
            Arc::clone(&self.lifecycle),
        )
        .with_retry(RetryPolicy::from_config(&self.config.consumer));
        if let Some(nats) = forward.clone() {
            consumer = consumer.with_forwarding(nats);
        }
        let mut consumer = tokio::spawn(consumer.run());

        let stop = wait_for_stop(shutdown, &mut consumer, query.as_mut()).await;

        lifecycle.begin_drain();
        let (consumer_done, query_result) = match stop {
            Stop::Signal => (false, None),
            Stop::Consumer(joined) => {
                joined.map_err(|e| task_failed("consumer", &e))?;
                (true, None)
            }
            Stop::Query(joined) => {
                query = None;
                (false, Some(joined))
            }
        };
        if !consumer_done {
            consumer.await.map_err(|e| task_failed("consumer", &e))?;
        }
        if let Some(nats) = &forward
            && let Err(e) = nats.flush().await
        {
            warn!(error = %e, "Failed to flush dead letters to NATS");
        }
        let query_result = match query {
            Some(query) => Some(query.await),
            None => query_result,
        };

        lifecycle.begin_finalize();
        let cursor = writer.await.map_err(|e| task_failed("writer", &e))??;
        lifecycle.mark_stopped();

        if let Some(joined) = query_result {
            joined.map_err(|e| task_failed("query", &e))??;
        }

        Ok(RunSummary {
            cursor,
            counters: self.stats.counters(),
        })
    }
}

/// Why the run stopped before draining.
#[derive(Debug)]
enum Stop<C, Q> {
    /// The shutdown future resolved.
    Signal,
    /// The consumer task ended on its own.
    Consumer(C),
    /// The query server task ended on its own.
    Query(Q),
}

/// Wait for a shutdown request or for the consumer or query task to end.
async fn wait_for_stop<F, C, Q>(
    shutdown: F,
    consumer: &mut C,
    query: Option<&mut Q>,
) -> Stop<C::Output, Q::Output>
where
    F: Future<Output = ()>,
    C: Future + Unpin,
    Q: Future + Unpin,
{
    let query_done = async {
        match query {
            Some(query) => query.await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        () = shutdown => {
            info!("Shutdown requested");
            Stop::Signal
        }
        joined = consumer => {
            warn!("Event consumer exited, shutting down");
            Stop::Consumer(joined)
        }
        joined = query_done => {
            warn!("Query server exited, shutting down");
            Stop::Query(joined)
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("location", &self.sink.describe())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::future::{pending, ready};

    use super::*;

    #[tokio::test]
    async fn query_exit_stops_the_run() {
        let mut consumer = pending::<()>();
        let mut query = ready(Err::<(), &str>("bind lost"));
        let stop = wait_for_stop(pending(), &mut consumer, Some(&mut query)).await;
        assert!(matches!(stop, Stop::Query(Err("bind lost"))));
    }

    #[tokio::test]
    async fn headless_run_waits_for_shutdown_or_consumer() {
        let mut consumer = ready(7_u8);
        let stop = wait_for_stop(pending(), &mut consumer, None::<&mut std::future::Ready<()>>).await;
        assert!(matches!(stop, Stop::Consumer(7)));

        let mut consumer = pending::<u8>();
        let stop = wait_for_stop(ready(()), &mut consumer, None::<&mut std::future::Pending<()>>).await;
        assert!(matches!(stop, Stop::Signal));
    }
}
