//! Snapshot persistence for the leaderboard service.
//!
//! The ranking store lives in memory; this crate makes it durable by
//! writing point-in-time snapshots (entries, offsets, activity sketch) to a
//! directory or a `PostgreSQL` table, and rebuilding the store from the
//! newest snapshot at startup.
//!
//! ```text
//! Consumer ---> SharedStore <--- capture --- SnapshotWriter ---> SnapshotStore
//!                                                                 |-- FileSnapshotStore
//!                                                                 +-- PostgresSnapshotStore
//! startup: SnapshotStore::latest --> recover() --> RankingStore
//! ```
//!
//! # Modules
//!
//! - [`store`] -- `SnapshotStore` trait and location parsing
//! - [`file`] -- Atomic JSON files in a directory
//! - [`postgres`] -- `PostgreSQL` table backend
//! - [`writer`] -- Interval / dirty-threshold snapshot task
//! - [`recovery`] -- Startup restore
//! - [`error`] -- Shared error types

pub mod error;
pub mod file;
pub mod postgres;
pub mod recovery;
pub mod store;
pub mod writer;

// Re-export primary types for convenience.
pub use error::DbError;
pub use file::FileSnapshotStore;
pub use postgres::{PostgresConfig, PostgresSnapshotStore};
pub use recovery::{Recovered, recover};
pub use store::{SnapshotLocation, SnapshotStore, open};
pub use writer::{SnapshotWriter, WriterCursor};
