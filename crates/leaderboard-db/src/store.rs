//! Snapshot storage backends and location parsing.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use leaderboard_types::SnapshotFile;

use crate::error::DbError;
use crate::file::FileSnapshotStore;
use crate::postgres::PostgresSnapshotStore;

/// Durable home of leaderboard snapshots.
///
/// `write` must be atomic: a crash mid-write leaves either the previous
/// latest snapshot or the new one visible, never a partial one.
///
/// # Implementations
///
/// - [`FileSnapshotStore`]: one JSON file per snapshot in a directory
/// - [`PostgresSnapshotStore`]: one row per snapshot in `leaderboard_snapshots`
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot`. Overwrites an existing snapshot with the same sequence.
    async fn write(&self, snapshot: &SnapshotFile) -> Result<(), DbError>;

    /// The snapshot with the highest sequence, if any.
    ///
    /// Fails with [`DbError::Corrupt`] if that snapshot cannot be decoded.
    async fn latest(&self) -> Result<Option<SnapshotFile>, DbError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Parsed `storage.location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLocation {
    /// A directory, from `file://<dir>` or a bare path.
    Directory(PathBuf),
    /// A `postgres://` or `postgresql://` URL.
    Postgres(String),
}

impl SnapshotLocation {
    /// Parse a location string.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for an empty location or an unknown scheme.
    pub fn parse(raw: &str) -> Result<Self, DbError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DbError::Config("snapshot location is empty".to_owned()));
        }
        if let Some(path) = raw.strip_prefix("file://") {
            if path.is_empty() {
                return Err(DbError::Config("file:// location has no path".to_owned()));
            }
            return Ok(Self::Directory(PathBuf::from(path)));
        }
        if raw.starts_with("postgres://") || raw.starts_with("postgresql://") {
            return Ok(Self::Postgres(raw.to_owned()));
        }
        if let Some((scheme, _)) = raw.split_once("://") {
            return Err(DbError::Config(format!(
                "unsupported snapshot location scheme: {scheme}"
            )));
        }
        Ok(Self::Directory(PathBuf::from(raw)))
    }
}

/// Open the backend named by `location`.
///
/// Directories are created if missing; `PostgreSQL` migrations are applied.
///
/// # Errors
///
/// Returns [`DbError::Config`] for an invalid location, or the backend's
/// connection/I/O error.
pub async fn open(location: &str) -> Result<Arc<dyn SnapshotStore>, DbError> {
    match SnapshotLocation::parse(location)? {
        SnapshotLocation::Directory(dir) => Ok(Arc::new(FileSnapshotStore::open(dir).await?)),
        SnapshotLocation::Postgres(url) => {
            Ok(Arc::new(PostgresSnapshotStore::connect_url(&url).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_locations() {
        assert_eq!(
            SnapshotLocation::parse("file:///var/lib/leaderboard").ok(),
            Some(SnapshotLocation::Directory(PathBuf::from("/var/lib/leaderboard")))
        );
        assert_eq!(
            SnapshotLocation::parse("./data/snapshots").ok(),
            Some(SnapshotLocation::Directory(PathBuf::from("./data/snapshots")))
        );
        assert_eq!(
            SnapshotLocation::parse("postgresql://u:p@db/lb").ok(),
            Some(SnapshotLocation::Postgres("postgresql://u:p@db/lb".to_owned()))
        );
    }

    #[test]
    fn rejects_unknown_scheme_and_empty() {
        assert!(matches!(SnapshotLocation::parse("s3://bucket"), Err(DbError::Config(_))));
        assert!(matches!(SnapshotLocation::parse("  "), Err(DbError::Config(_))));
        assert!(matches!(SnapshotLocation::parse("file://"), Err(DbError::Config(_))));
    }
}
