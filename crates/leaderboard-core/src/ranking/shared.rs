//! Concurrent handle to the ranking store.
//!
//! One writer (the consumer) and many readers (query handlers, the snapshot
//! writer) share a [`RankingStore`] behind a Tokio `RwLock`. Every lock
//! acquisition is bounded by a timeout and surfaces as
//! [`CoreError::StoreBusy`] instead of waiting indefinitely.
//!
//! After each write the store revision is published on a [`watch`] channel,
//! which the snapshot writer uses to detect dirty-threshold crossings.

use std::sync::Arc;
use std::time::Duration;

use leaderboard_types::{SnapshotFile, StreamPosition};
use tokio::sync::{RwLock, RwLockReadGuard, watch};
use tokio::time::timeout;

use super::store::{ApplyOutcome, RankingStore, ScoreUpdate};
use crate::error::CoreError;

/// Cloneable handle to a shared [`RankingStore`].
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<RankingStore>>,
    revision: Arc<watch::Sender<u64>>,
    read_timeout: Duration,
    write_timeout: Duration,
}

fn busy(waited: Duration) -> CoreError {
    CoreError::StoreBusy {
        waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
    }
}

impl SharedStore {
    /// Wrap `store` with the given lock timeouts.
    pub fn new(store: RankingStore, read_timeout: Duration, write_timeout: Duration) -> Self {
        let (revision, _) = watch::channel(store.revision());
        Self {
            inner: Arc::new(RwLock::new(store)),
            revision: Arc::new(revision),
            read_timeout,
            write_timeout,
        }
    }

    /// Acquire a read guard.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreBusy`] if the lock is not granted within the
    /// read timeout.
    pub async fn read(&self) -> Result<RwLockReadGuard<'_, RankingStore>, CoreError> {
        let Ok(guard) = timeout(self.read_timeout, self.inner.read()).await else {
            return Err(busy(self.read_timeout));
        };
        Ok(guard)
    }

    /// Run `f` under the write lock, then publish the new revision.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreBusy`] if the lock is not granted within the
    /// write timeout; `f` is not run.
    pub async fn write<R, F>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut RankingStore) -> R,
    {
        let Ok(mut guard) = timeout(self.write_timeout, self.inner.write()).await else {
            return Err(busy(self.write_timeout));
        };
        let out = f(&mut *guard);
        let revision = guard.revision();
        drop(guard);
        self.revision.send_if_modified(|current| {
            if *current == revision {
                return false;
            }
            *current = revision;
            true
        });
        Ok(out)
    }

    /// Apply a stream record; see [`RankingStore::apply_update`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreBusy`] on lock timeout or
    /// [`CoreError::Ranking`] if the store rejects the update.
    pub async fn apply_update(
        &self,
        update: &ScoreUpdate,
        position: &StreamPosition,
    ) -> Result<ApplyOutcome, CoreError> {
        Ok(self
            .write(|store| store.apply_update(update, Some(position)))
            .await??)
    }

    /// Commit an offset without applying a record (after dead-lettering it).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreBusy`] on lock timeout.
    pub async fn commit_offset(&self, position: &StreamPosition) -> Result<bool, CoreError> {
        self.write(|store| store.commit_offset(position)).await
    }

    /// Whether `position` is already committed; see [`RankingStore::is_committed`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreBusy`] on lock timeout.
    pub async fn is_committed(&self, position: &StreamPosition) -> Result<bool, CoreError> {
        Ok(self.read().await?.is_committed(position))
    }

    /// Capture a snapshot under the read lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreBusy`] on lock timeout.
    pub async fn capture(&self, sequence: u64) -> Result<SnapshotFile, CoreError> {
        Ok(self.read().await?.checkpoint(sequence))
    }

    /// Latest published revision, without locking.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified whenever the revision changes.
    pub fn subscribe_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
