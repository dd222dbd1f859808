//! Shared state for the query handlers.

use std::sync::Arc;

use leaderboard_core::{DeadLetterLog, Lifecycle, PipelineStats, SharedStore};

/// Default number of dead letters returned when `limit` is absent.
pub const DEFAULT_DEAD_LETTER_LIMIT: usize = 50;

/// Default page size for `/api/top` and `/api/activity/top`.
pub const DEFAULT_TOP_K: usize = 10;

/// Everything a handler can read.
///
/// The store is only ever read here; each read is bounded by the
/// `SharedStore` read timeout and surfaces as `503` when it expires.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The ranking store.
    pub store: SharedStore,
    /// Pipeline counters.
    pub stats: Arc<PipelineStats>,
    /// Recent dead letters.
    pub dead_letters: Arc<DeadLetterLog>,
    /// Process lifecycle; requests are refused once draining.
    pub lifecycle: Arc<Lifecycle>,
}

impl AppState {
    /// Bundle the shared components.
    pub const fn new(
        store: SharedStore,
        stats: Arc<PipelineStats>,
        dead_letters: Arc<DeadLetterLog>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            store,
            stats,
            dead_letters,
            lifecycle,
        }
    }
}
