//! Ranking state: the order-statistic index, the store built on it, and
//! the lock-bounded shared handle.

pub mod index;
pub mod shared;
pub mod store;

pub use index::{RankIndex, RankKey};
pub use shared::SharedStore;
pub use store::{ApplyOutcome, RankInfo, RankingStore, ScoreUpdate, StoreSettings};
