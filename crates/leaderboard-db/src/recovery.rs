//! Startup recovery from the latest snapshot.

use leaderboard_core::{RankingStore, StoreSettings};

use crate::error::DbError;
use crate::store::SnapshotStore;
use crate::writer::WriterCursor;

/// State rebuilt at startup.
#[derive(Debug)]
pub struct Recovered {
    /// The restored (or empty) store.
    pub store: RankingStore,
    /// Where the snapshot writer continues.
    pub cursor: WriterCursor,
}

/// Load the latest snapshot from `sink`, or start empty if there is none.
///
/// The consumer resumes from the restored store's offsets.
///
/// # Errors
///
/// Returns [`DbError::Corrupt`] if the latest snapshot cannot be decoded,
/// [`DbError::Restore`] if its format is unknown or its content
/// inconsistent, or the backend's I/O error. All of these are fatal.
pub async fn recover(sink: &dyn SnapshotStore, settings: StoreSettings) -> Result<Recovered, DbError> {
    let Some(snapshot) = sink.latest().await? else {
        tracing::info!(location = %sink.describe(), "No snapshot found, starting empty");
        return Ok(Recovered {
            store: RankingStore::new(settings),
            cursor: WriterCursor::default(),
        });
    };

    let sequence = snapshot.sequence;
    let captured_at = snapshot.captured_at;
    let store = RankingStore::restore(snapshot, settings)?;
    tracing::info!(
        sequence,
        %captured_at,
        revision = store.revision(),
        entities = store.len(),
        offsets = ?store.offsets(),
        "Restored leaderboard from snapshot"
    );
    Ok(Recovered {
        cursor: WriterCursor {
            sequence,
            revision: store.revision(),
        },
        store,
    })
}
