//! REST endpoint handlers for the query API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and drain status |
//! | `GET` | `/api/rank/{entity_id}` | Rank, score, and percentile of one entity |
//! | `GET` | `/api/top` | Exact leaderboard page (`?k=&offset=`) |
//! | `GET` | `/api/activity/top` | Approximate most-updated entities (`?k=`) |
//! | `GET` | `/api/stats` | Store size, revision, pipeline counters |
//! | `GET` | `/api/dead-letters` | Most recent dead letters (`?limit=`) |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use leaderboard_core::Phase;
use leaderboard_types::{
    ActivityEntry, ActivityResponse, DeadLettersResponse, EntityId, HealthResponse, RankResponse,
    RankedEntry, StatsResponse, TopResponse,
};
use serde::Deserialize;

use crate::error::QueryError;
use crate::state::{AppState, DEFAULT_DEAD_LETTER_LIMIT, DEFAULT_TOP_K};

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, QueryError> {
    params
        .map(|Query(p)| p)
        .map_err(|e| QueryError::InvalidQuery(e.body_text()))
}

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/top`.
#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    /// Page size, clamped to `query.max_top_k` (default 10).
    pub k: Option<usize>,
    /// 0-based offset of the first entry (default 0).
    pub offset: Option<usize>,
}

/// Query parameters for `GET /api/activity/top`.
#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    /// Number of entries, clamped to `query.max_top_k` (default 10).
    pub k: Option<usize>,
}

/// Query parameters for `GET /api/dead-letters`.
#[derive(Debug, Default, Deserialize)]
pub struct DeadLettersQuery {
    /// Maximum number of records (default 50).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Refuse API requests once the process has started draining.
pub async fn reject_when_draining(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.lifecycle.is_accepting() {
        next.run(request).await
    } else {
        QueryError::Unavailable(format!("server is {}", state.lifecycle.phase())).into_response()
    }
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// `200 {"status":"ok"}` while running, `503 {"status":"draining"}` after.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, label) = if state.lifecycle.phase() == Phase::Running {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_owned(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /api/rank/{entity_id}
// ---------------------------------------------------------------------------

/// Rank, score, and percentile of one entity.
pub async fn get_rank(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<RankResponse>, QueryError> {
    let entity_id = EntityId::parse(&raw_id)
        .map_err(|e| QueryError::InvalidQuery(format!("entity id {raw_id:?}: {e}")))?;

    let info = state.store.read().await?.percentile_of(&entity_id)?;

    Ok(Json(RankResponse {
        entity_id: info.entry.entity_id,
        score: info.entry.score,
        rank: to_u64(info.rank),
        total: to_u64(info.total),
        percentile: info.percentile,
        last_updated: info.entry.last_updated,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/top
// ---------------------------------------------------------------------------

/// A page of the exact leaderboard.
///
/// `k=0` or an offset past the end yields an empty list, not an error.
pub async fn get_top(
    State(state): State<Arc<AppState>>,
    params: Result<Query<TopQuery>, QueryRejection>,
) -> Result<Json<TopResponse>, QueryError> {
    let params = query_params(params)?;
    let k = params.k.unwrap_or(DEFAULT_TOP_K);
    let offset = params.offset.unwrap_or(0);

    let store = state.store.read().await?;
    let entries: Vec<RankedEntry> = store
        .page(offset, k)
        .into_iter()
        .map(|(rank, entry)| RankedEntry {
            rank: to_u64(rank),
            entity_id: entry.entity_id,
            score: entry.score,
            last_updated: entry.last_updated,
        })
        .collect();
    let total = store.len();
    drop(store);

    Ok(Json(TopResponse {
        offset: to_u64(offset),
        count: to_u64(entries.len()),
        total: to_u64(total),
        entries,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/activity/top
// ---------------------------------------------------------------------------

/// Entities with the most applied updates, estimated by the count-min sketch.
pub async fn get_activity_top(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ActivityQuery>, QueryRejection>,
) -> Result<Json<ActivityResponse>, QueryError> {
    let params = query_params(params)?;
    let k = params.k.unwrap_or(DEFAULT_TOP_K);

    let entries: Vec<ActivityEntry> = state
        .store
        .read()
        .await?
        .activity_top(k)
        .into_iter()
        .map(|(entity_id, estimated_updates)| ActivityEntry {
            entity_id,
            estimated_updates,
        })
        .collect();

    Ok(Json(ActivityResponse {
        count: to_u64(entries.len()),
        entries,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/stats
// ---------------------------------------------------------------------------

/// Store size, revision, and pipeline counters.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, QueryError> {
    let (entities, revision) = {
        let store = state.store.read().await?;
        (store.len(), store.revision())
    };
    let counters = state.stats.counters();

    Ok(Json(StatsResponse {
        entities: to_u64(entities),
        revision,
        events_received: counters.events_received,
        events_applied: counters.events_applied,
        duplicates_skipped: counters.duplicates_skipped,
        dead_letters: counters.dead_letters,
        last_snapshot_sequence: counters.last_snapshot_sequence,
        phase: state.lifecycle.phase().to_string(),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/dead-letters
// ---------------------------------------------------------------------------

/// Most recent dead letters, newest first.
pub async fn list_dead_letters(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DeadLettersQuery>, QueryRejection>,
) -> Result<Json<DeadLettersResponse>, QueryError> {
    let params = query_params(params)?;
    let limit = params.limit.unwrap_or(DEFAULT_DEAD_LETTER_LIMIT);

    Ok(Json(DeadLettersResponse {
        total: state.dead_letters.total(),
        records: state.dead_letters.recent(limit).await,
    }))
}
