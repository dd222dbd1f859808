//! Integration tests for the consume loop over an in-memory source.
//!
//! These need no NATS server; `JetStreamSource` is covered by the ignored
//! test at the bottom.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::sync::Arc;
use std::time::Duration;

use leaderboard_consumer::{EventConsumer, MemorySource};
use leaderboard_core::{
    DeadLetterLog, Lifecycle, PipelineStats, RankingStore, RetryPolicy, SharedStore,
    StoreSettings,
};
use leaderboard_types::{DeadLetterKind, EntityId, StreamPosition};

fn event(entity: &str, score: i64) -> Vec<u8> {
    format!(r#"{{"entity_id":"{entity}","score":{score},"event_time":"2026-03-01T12:00:00Z"}}"#)
        .into_bytes()
}

fn id(raw: &str) -> EntityId {
    EntityId::parse(raw).unwrap()
}

struct Harness {
    store: SharedStore,
    stats: Arc<PipelineStats>,
    dead_letters: Arc<DeadLetterLog>,
    lifecycle: Arc<Lifecycle>,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(RankingStore::new(StoreSettings::default()))
    }

    fn with_store(store: RankingStore) -> Self {
        Self {
            store: SharedStore::new(store, Duration::from_millis(20), Duration::from_millis(20)),
            stats: Arc::new(PipelineStats::new()),
            dead_letters: Arc::new(DeadLetterLog::new(16)),
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    fn consumer(&self, source: MemorySource) -> EventConsumer<MemorySource> {
        EventConsumer::new(
            source,
            self.store.clone(),
            Arc::clone(&self.stats),
            Arc::clone(&self.dead_letters),
            Arc::clone(&self.lifecycle),
        )
        .with_retry(RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2,
            jitter: false,
        })
    }
}

// =============================================================================
// Happy path and ordering
// =============================================================================

#[tokio::test]
async fn applies_records_in_stream_order() {
    let h = Harness::new();
    let source = MemorySource::from_payloads(
        "SCORES",
        [event("A", 100), event("B", 200), event("C", 150), event("A", 250)],
    );

    let source = h.consumer(source).run().await;

    let store = h.store.read().await.unwrap();
    let ids: Vec<String> = store
        .top_k(10)
        .into_iter()
        .map(|e| e.entity_id.to_string())
        .collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert_eq!(store.get(&id("A")).unwrap().score, 250);
    assert_eq!(store.offsets().get("SCORES"), Some(&4));
    assert_eq!(source.committed().len(), 4);

    let counters = h.stats.counters();
    assert_eq!(counters.events_received, 4);
    assert_eq!(counters.events_applied, 4);
    assert_eq!(counters.dead_letters, 0);
}

#[tokio::test]
async fn redelivered_records_are_skipped() {
    let h = Harness::new();
    let mut source = MemorySource::from_payloads("SCORES", [event("A", 10), event("A", 20)]);
    source.push_at(StreamPosition::new("SCORES", 1), event("A", 10));

    let source = h.consumer(source).run().await;

    let store = h.store.read().await.unwrap();
    assert_eq!(store.get(&id("A")).unwrap().score, 20);
    assert_eq!(h.stats.counters().duplicates_skipped, 1);
    assert_eq!(source.committed().len(), 3);
}

#[tokio::test]
async fn redelivered_malformed_record_is_dead_lettered_once() {
    let h = Harness::new();
    let mut source = MemorySource::from_payloads("SCORES", [b"garbage".to_vec(), event("A", 5)]);
    source.push_at(StreamPosition::new("SCORES", 1), b"garbage".to_vec());

    let source = h.consumer(source).run().await;

    let counters = h.stats.counters();
    assert_eq!(counters.dead_letters, 1);
    assert_eq!(counters.duplicates_skipped, 1);
    assert_eq!(counters.events_applied, 1);
    assert_eq!(h.dead_letters.recent(10).await.len(), 1);
    assert_eq!(source.committed().len(), 3);
}

// =============================================================================
// Dead letters
// =============================================================================

#[tokio::test]
async fn malformed_record_is_dead_lettered_and_consumption_continues() {
    let h = Harness::new();
    let source = MemorySource::from_payloads(
        "SCORES",
        [
            event("A", 1),
            b"{\"entity_id\":\"B\",\"score\":\"lots\"}".to_vec(),
            event("C", 3),
        ],
    );

    h.consumer(source).run().await;

    let records = h.dead_letters.recent(10).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, DeadLetterKind::Validation);
    assert_eq!(records[0].offset, 2);
    assert!(records[0].payload.contains("lots"));

    let store = h.store.read().await.unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.offsets().get("SCORES"), Some(&3));
    assert_eq!(h.stats.counters().dead_letters, 1);
}

#[tokio::test]
async fn out_of_range_score_is_rejected_without_touching_the_store() {
    let h = Harness::new();
    let source = MemorySource::from_payloads("SCORES", [event("A", -5)]);

    h.consumer(source).run().await;

    let records = h.dead_letters.recent(10).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, DeadLetterKind::Validation);
    assert!(records[0].reason.contains("rejected"));

    let store = h.store.read().await.unwrap();
    assert!(store.is_empty());
    assert_eq!(store.offsets().get("SCORES"), Some(&1));
}

#[tokio::test]
async fn busy_store_exhausts_retries() {
    let h = Harness::new();
    let source = MemorySource::from_payloads("SCORES", [event("A", 1)]);
    let consumer = h.consumer(source);

    let guard = h.store.read().await.unwrap();
    let source = consumer.run().await;
    drop(guard);

    let records = h.dead_letters.recent(10).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, DeadLetterKind::RetriesExhausted);
    assert_eq!(source.committed().len(), 1);

    let store = h.store.read().await.unwrap();
    assert!(store.is_empty());
    assert!(store.offsets().get("SCORES").is_none());
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn draining_stops_an_idle_consumer() {
    let h = Harness::new();
    let source = MemorySource::from_payloads("SCORES", [event("A", 7)]).hold_open();
    let handle = tokio::spawn(h.consumer(source).run());

    for _ in 0..100 {
        if h.stats.counters().events_applied == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    h.lifecycle.begin_drain();

    let source = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer did not stop after drain")
        .unwrap();
    assert_eq!(source.committed().len(), 1);
}

#[tokio::test]
async fn resumed_source_continues_after_committed_offset() {
    let mut seeded = RankingStore::new(StoreSettings::default());
    seeded
        .apply_update(
            &leaderboard_core::ScoreUpdate {
                entity_id: id("A"),
                score: 10,
                event_time: chrono::Utc::now(),
            },
            Some(&StreamPosition::new("SCORES", 1)),
        )
        .unwrap();
    let committed = seeded.offsets().get("SCORES").copied().unwrap();
    let h = Harness::with_store(seeded);

    let source = MemorySource::from_payloads("SCORES", [event("A", 10), event("B", 20)])
        .resume_after(committed);
    let source = h.consumer(source).run().await;

    assert_eq!(source.committed(), &[StreamPosition::new("SCORES", 2)]);
    assert_eq!(h.stats.counters().events_applied, 1);
    assert_eq!(h.store.read().await.unwrap().len(), 2);
}

// =============================================================================
// JetStream (live)
// =============================================================================

#[tokio::test]
#[ignore = "requires a running NATS server with JetStream"]
async fn publishes_and_consumes_through_jetstream() {
    use leaderboard_consumer::{JetStreamSource, NatsClient};
    use leaderboard_core::config::StreamConfig;
    use leaderboard_types::ScoreEvent;

    let config = StreamConfig {
        stream_name: format!("SCORES_TEST_{}", std::process::id()),
        subject: format!("scores.test.{}", std::process::id()),
        ..StreamConfig::default()
    };
    let nats = NatsClient::connect(&config)
        .await
        .expect("Failed to connect to NATS -- is Docker running?");
    nats.ensure_stream().await.unwrap();
    let first = nats.publish_event(&ScoreEvent::new(id("A"), 5)).await.unwrap();
    nats.publish_event(&ScoreEvent::new(id("B"), 9)).await.unwrap();

    let h = Harness::new();
    let source = JetStreamSource::open(&nats, None).await.unwrap();
    let handle = tokio::spawn(EventConsumer::new(
        source,
        h.store.clone(),
        Arc::clone(&h.stats),
        Arc::clone(&h.dead_letters),
        Arc::clone(&h.lifecycle),
    )
    .run());

    for _ in 0..200 {
        if h.stats.counters().events_applied == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    h.lifecycle.begin_drain();
    handle.await.unwrap();

    let store = h.store.read().await.unwrap();
    assert_eq!(store.top_k(1)[0].entity_id, id("B"));
    assert_eq!(
        store.offsets().get(&config.stream_name),
        Some(&first.saturating_add(1))
    );
}

#[tokio::test]
#[ignore = "requires a running NATS server"]
async fn dead_letters_reach_the_subject_before_shutdown() {
    use futures::StreamExt;
    use leaderboard_consumer::NatsClient;
    use leaderboard_core::config::StreamConfig;
    use leaderboard_types::DeadLetterRecord;

    let subject = format!("scores.dead.test.{}", std::process::id());
    let config = StreamConfig {
        dead_letter_subject: Some(subject.clone()),
        ..StreamConfig::default()
    };
    let nats = NatsClient::connect(&config)
        .await
        .expect("Failed to connect to NATS -- is Docker running?");
    let mut dead = nats.client().subscribe(subject).await.unwrap();
    nats.flush().await.unwrap();

    let h = Harness::new();
    let source = MemorySource::from_payloads("SCORES", [b"garbage".to_vec()]);
    h.consumer(source).with_forwarding(nats.clone()).run().await;
    nats.flush().await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), dead.next())
        .await
        .unwrap()
        .unwrap();
    let record: DeadLetterRecord = serde_json::from_slice(&message.payload).unwrap();
    assert_eq!(record.offset, 1);
    assert_eq!(record.kind, DeadLetterKind::Validation);
}
