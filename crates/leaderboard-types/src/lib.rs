//! Shared type definitions for the leaderboard service.
//!
//! This crate is the single source of truth for the types that cross a
//! process boundary: stream records, snapshot files, and query API bodies.
//! API types flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Validated entity identifier
//! - [`score`] -- Score entries and update modes
//! - [`event`] -- Stream records and positions
//! - [`snapshot`] -- Durable snapshot layout
//! - [`api`] -- Query API request/response bodies

pub mod api;
pub mod event;
pub mod ids;
pub mod score;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use api::{
    ActivityEntry, ActivityResponse, DeadLetterKind, DeadLetterRecord, DeadLettersResponse,
    HealthResponse, RankResponse, RankedEntry, StatsResponse, TopResponse,
};
pub use event::{ScoreEvent, StreamPosition};
pub use ids::{EntityId, EntityIdError, MAX_ENTITY_ID_LEN};
pub use score::{ScoreEntry, UpdateMode};
pub use snapshot::{SNAPSHOT_FORMAT, SketchState, SnapshotFile};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the API surface.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        crate::ids::EntityId::export_all().unwrap();
        crate::score::ScoreEntry::export_all().unwrap();
        crate::score::UpdateMode::export_all().unwrap();
        crate::event::ScoreEvent::export_all().unwrap();
        crate::event::StreamPosition::export_all().unwrap();

        crate::api::RankedEntry::export_all().unwrap();
        crate::api::RankResponse::export_all().unwrap();
        crate::api::TopResponse::export_all().unwrap();
        crate::api::ActivityEntry::export_all().unwrap();
        crate::api::ActivityResponse::export_all().unwrap();
        crate::api::StatsResponse::export_all().unwrap();
        crate::api::DeadLetterKind::export_all().unwrap();
        crate::api::DeadLetterRecord::export_all().unwrap();
        crate::api::DeadLettersResponse::export_all().unwrap();
        crate::api::HealthResponse::export_all().unwrap();
    }
}
