//! Directory-backed snapshot store.
//!
//! Each snapshot is a pretty-printed JSON file named
//! `snapshot-<sequence:020>.json`, so lexical and numeric order agree.
//! Writes go to `<name>.tmp`, are fsynced, then renamed over the final name;
//! readers never see a partial snapshot. Leftover `.tmp` files from a crash
//! are ignored and removed on the next write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use leaderboard_types::SnapshotFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::DbError;
use crate::store::SnapshotStore;

/// Default number of snapshots kept on disk.
pub const DEFAULT_RETAIN: usize = 3;

const PREFIX: &str = "snapshot-";
const SUFFIX: &str = ".json";
const TMP_SUFFIX: &str = ".json.tmp";

/// File name for snapshot `sequence`.
pub fn file_name(sequence: u64) -> String {
    format!("{PREFIX}{sequence:020}{SUFFIX}")
}

fn parse_sequence(name: &str) -> Option<u64> {
    name.strip_prefix(PREFIX)?
        .strip_suffix(SUFFIX)?
        .parse()
        .ok()
}

/// Snapshots as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    retain: usize,
}

impl FileSnapshotStore {
    /// Use `dir`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, DbError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| DbError::io(&dir, e))?;
        tracing::info!(dir = %dir.display(), "Using snapshot directory");
        Ok(Self {
            dir,
            retain: DEFAULT_RETAIN,
        })
    }

    /// Keep the newest `retain` snapshots (at least one).
    #[must_use]
    pub fn with_retain(mut self, retain: usize) -> Self {
        self.retain = retain.max(1);
        self
    }

    /// Snapshot directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sequences present on disk, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the directory cannot be listed.
    pub async fn sequences(&self) -> Result<Vec<u64>, DbError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| DbError::io(&self.dir, e))?;
        let mut sequences = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DbError::io(&self.dir, e))?
        {
            if let Some(seq) = entry.file_name().to_str().and_then(parse_sequence) {
                sequences.push(seq);
            }
        }
        sequences.sort_unstable();
        Ok(sequences)
    }

    async fn sync_dir(&self) {
        // Not every platform can fsync a directory.
        if let Ok(dir) = fs::File::open(&self.dir).await
            && let Err(error) = dir.sync_all().await
        {
            tracing::debug!(%error, "Directory fsync not supported");
        }
    }

    async fn prune(&self) -> Result<(), DbError> {
        let sequences = self.sequences().await?;
        let excess = sequences.len().saturating_sub(self.retain);
        for seq in sequences.into_iter().take(excess) {
            let path = self.dir.join(file_name(seq));
            if let Err(error) = fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), %error, "Failed to prune old snapshot");
            }
        }

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| DbError::io(&self.dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DbError::io(&self.dir, e))?
        {
            let is_tmp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(PREFIX) && name.ends_with(TMP_SUFFIX));
            if is_tmp {
                let _ = fs::remove_file(entry.path()).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn write(&self, snapshot: &SnapshotFile) -> Result<(), DbError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let target = self.dir.join(file_name(snapshot.sequence));
        let tmp = self
            .dir
            .join(format!("{PREFIX}{:020}{TMP_SUFFIX}", snapshot.sequence));

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| DbError::io(&tmp, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| DbError::io(&tmp, e))?;
        file.sync_all().await.map_err(|e| DbError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &target)
            .await
            .map_err(|e| DbError::io(&target, e))?;
        self.sync_dir().await;

        tracing::debug!(
            sequence = snapshot.sequence,
            bytes = bytes.len(),
            path = %target.display(),
            "Wrote snapshot file"
        );

        self.prune().await
    }

    async fn latest(&self) -> Result<Option<SnapshotFile>, DbError> {
        let Some(&sequence) = self.sequences().await?.last() else {
            return Ok(None);
        };
        let path = self.dir.join(file_name(sequence));
        let bytes = fs::read(&path).await.map_err(|e| DbError::io(&path, e))?;
        let snapshot: SnapshotFile =
            serde_json::from_slice(&bytes).map_err(|e| DbError::Corrupt {
                location: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if snapshot.sequence != sequence {
            return Err(DbError::Corrupt {
                location: path.display().to_string(),
                reason: format!("file name says sequence {sequence}, body says {}", snapshot.sequence),
            });
        }
        Ok(Some(snapshot))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_sort_numerically() {
        assert_eq!(file_name(42), "snapshot-00000000000000000042.json");
        assert!(file_name(9) < file_name(10));
        assert_eq!(parse_sequence(&file_name(u64::MAX)), Some(u64::MAX));
        assert_eq!(parse_sequence("snapshot-00000000000000000001.json.tmp"), None);
        assert_eq!(parse_sequence("notes.json"), None);
    }
}
