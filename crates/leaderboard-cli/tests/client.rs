//! `QueryClient` against a live query server on a loopback socket.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leaderboard_cli::QueryClient;
use leaderboard_core::{
    DeadLetterLog, LeaderboardConfig, Lifecycle, PipelineStats, RankingStore, ScoreUpdate,
    SharedStore, StoreSettings,
};
use leaderboard_query::AppState;
use leaderboard_types::{EntityId, StreamPosition};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Reserved URL characters that must survive as one path segment.
const TRICKY_ID: &str = "A#x/y?z%2F";

struct Running {
    url: String,
    lifecycle: Arc<Lifecycle>,
    server: JoinHandle<Result<(), leaderboard_query::ServerError>>,
}

impl Running {
    async fn stop(self) {
        self.lifecycle.begin_drain();
        self.server.await.unwrap().unwrap();
    }
}

async fn start() -> Running {
    let mut store = RankingStore::new(StoreSettings::from_config(&LeaderboardConfig::default()));
    for (offset, raw, score) in [
        (1, "A", 100),
        (2, "B", 200),
        (3, "C", 150),
        (4, TRICKY_ID, 50),
    ] {
        let update = ScoreUpdate {
            entity_id: EntityId::parse(raw).unwrap(),
            score,
            event_time: Utc::now(),
        };
        store
            .apply_update(&update, Some(&StreamPosition::new("SCORES", offset)))
            .unwrap();
    }

    let lifecycle = Arc::new(Lifecycle::new());
    let state = Arc::new(AppState::new(
        SharedStore::new(store, Duration::from_millis(200), Duration::from_millis(200)),
        Arc::new(PipelineStats::new()),
        Arc::new(DeadLetterLog::new(8)),
        Arc::clone(&lifecycle),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(leaderboard_query::serve(listener, state));
    Running {
        url,
        lifecycle,
        server,
    }
}

#[tokio::test]
async fn top_and_rank_round_trip_over_http() {
    let running = start().await;
    let client = QueryClient::new(&running.url).unwrap();

    assert_eq!(client.health().await.unwrap().status, "ok");

    let top = client.top(2, 0).await.unwrap();
    assert_eq!(top.total, 4);
    let ids: Vec<&str> = top.entries.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, ["B", "C"]);

    let rank = client.rank(&EntityId::parse("A").unwrap()).await.unwrap();
    assert_eq!(rank.rank, 3);
    assert_eq!(rank.score, 100);

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.entities, 4);
    assert_eq!(stats.revision, 4);

    running.stop().await;
}

#[tokio::test]
async fn unknown_entity_surfaces_the_server_message() {
    let running = start().await;
    let client = QueryClient::new(&format!("{}/", running.url)).unwrap();

    let err = client
        .rank(&EntityId::parse("nobody").unwrap())
        .await
        .unwrap_err()
        .to_string();
    assert!(err.contains("404"), "{err}");
    assert!(err.contains("nobody"), "{err}");

    running.stop().await;
}

#[tokio::test]
async fn reserved_characters_in_ids_are_path_encoded() {
    let running = start().await;
    let client = QueryClient::new(&running.url).unwrap();

    let rank = client.rank(&EntityId::parse(TRICKY_ID).unwrap()).await.unwrap();
    assert_eq!(rank.entity_id.as_str(), TRICKY_ID);
    assert_eq!(rank.rank, 4);
    assert_eq!(rank.score, 50);

    // A prefix that would alias "A" if `#` became a fragment.
    let err = client
        .rank(&EntityId::parse("A#x").unwrap())
        .await
        .unwrap_err()
        .to_string();
    assert!(err.contains("404"), "{err}");

    running.stop().await;
}

#[tokio::test]
async fn activity_counts_every_update() {
    let running = start().await;
    let client = QueryClient::new(&running.url).unwrap();

    let activity = client.activity_top(10).await.unwrap();
    assert_eq!(activity.count, 4);
    assert!(activity.entries.iter().all(|e| e.estimated_updates >= 1));

    let dead = client.dead_letters(5).await.unwrap();
    assert_eq!(dead.total, 0);
    assert!(dead.records.is_empty());

    running.stop().await;
}
