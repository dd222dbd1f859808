//! The authoritative in-memory leaderboard.
//!
//! [`RankingStore`] keeps one [`ScoreEntry`] per entity in a hash map and
//! mirrors every entry into a [`RankIndex`] so rank, percentile, and page
//! queries run in logarithmic time. Applying a stream record, recording its
//! activity, and committing its offset happen in one `&mut self` call, so
//! any snapshot taken between calls is consistent with its offsets.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use chrono::{DateTime, Utc};
use leaderboard_types::{
    EntityId, SNAPSHOT_FORMAT, ScoreEntry, ScoreEvent, SnapshotFile, StreamPosition, UpdateMode,
};
use tracing::warn;

use super::index::{RankIndex, RankKey};
use crate::config::LeaderboardConfig;
use crate::error::RankingError;
use crate::sketch::CountMinSketch;

/// Store limits and update semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Smallest accepted score.
    pub min_score: i64,
    /// Largest accepted score.
    pub max_score: i64,
    /// Upper bound on listing sizes.
    pub max_top_k: usize,
    /// How incoming scores combine with stored ones.
    pub mode: UpdateMode,
    /// Activity sketch width.
    pub sketch_width: usize,
    /// Activity sketch depth.
    pub sketch_depth: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from_config(&LeaderboardConfig::default())
    }
}

impl StoreSettings {
    /// Extract the store-relevant settings.
    pub const fn from_config(config: &LeaderboardConfig) -> Self {
        Self {
            min_score: config.scoring.min_score,
            max_score: config.scoring.max_score,
            max_top_k: config.query.max_top_k,
            mode: config.scoring.mode,
            sketch_width: config.sketch.width,
            sketch_depth: config.sketch.depth,
        }
    }
}

/// A decoded score update ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreUpdate {
    /// Target entity.
    pub entity_id: EntityId,
    /// Score, or delta in increment mode.
    pub score: i64,
    /// Producer timestamp, stored as `last_updated`.
    pub event_time: DateTime<Utc>,
}

impl From<ScoreEvent> for ScoreUpdate {
    fn from(event: ScoreEvent) -> Self {
        Self {
            entity_id: event.entity_id,
            score: event.score,
            event_time: event.event_time,
        }
    }
}

/// Result of [`RankingStore::apply_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update changed the store.
    Applied {
        /// Score before the update, if the entity existed.
        previous: Option<i64>,
        /// Score after the update.
        score: i64,
    },
    /// The record's offset was already committed.
    Duplicate,
}

/// Position of one entity within the ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankInfo {
    /// The entity's entry.
    pub entry: ScoreEntry,
    /// 1-based rank.
    pub rank: usize,
    /// Number of ranked entities.
    pub total: usize,
    /// Share of entities ranked at or below this one, in percent.
    pub percentile: f64,
}

/// Percent of `total` entities ranked at or below `rank`, two decimals.
fn percentile(rank: usize, total: usize) -> f64 {
    let at_or_below = u128::try_from(total.saturating_sub(rank).saturating_add(1)).unwrap_or(0);
    let total = u128::try_from(total).unwrap_or(u128::MAX);
    let basis_points = at_or_below
        .saturating_mul(10_000)
        .checked_div(total)
        .unwrap_or(0);
    f64::from(u32::try_from(basis_points).unwrap_or(10_000)) / 100.0
}

/// In-memory leaderboard with an order-statistic index.
#[derive(Debug)]
pub struct RankingStore {
    settings: StoreSettings,
    entries: HashMap<EntityId, ScoreEntry>,
    index: RankIndex,
    revision: u64,
    offsets: BTreeMap<String, u64>,
    activity: CountMinSketch,
}

impl RankingStore {
    /// Create an empty store.
    pub fn new(settings: StoreSettings) -> Self {
        let activity = CountMinSketch::new(settings.sketch_width, settings.sketch_depth);
        Self {
            settings,
            entries: HashMap::new(),
            index: RankIndex::new(),
            revision: 0,
            offsets: BTreeMap::new(),
            activity,
        }
    }

    /// Active settings.
    pub const fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Number of ranked entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entity is ranked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of successful upserts over the store's lineage.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Last committed offset per partition.
    pub const fn offsets(&self) -> &BTreeMap<String, u64> {
        &self.offsets
    }

    /// Entry for `entity_id`, if ranked.
    pub fn get(&self, entity_id: &EntityId) -> Option<&ScoreEntry> {
        self.entries.get(entity_id)
    }

    fn check_range(&self, score: i64) -> Result<(), RankingError> {
        if score < self.settings.min_score || score > self.settings.max_score {
            return Err(RankingError::InvalidScore {
                score,
                min: self.settings.min_score,
                max: self.settings.max_score,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Set the score of `entity_id`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::InvalidScore`] if `score` is out of range; the
    /// store is unchanged.
    pub fn upsert(&mut self, entity_id: EntityId, score: i64) -> Result<Option<i64>, RankingError> {
        self.upsert_at(entity_id, score, Utc::now())
    }

    /// Set the score of `entity_id` with an explicit timestamp.
    ///
    /// Returns the previous score, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::InvalidScore`] if `score` is out of range; the
    /// store is unchanged.
    pub fn upsert_at(
        &mut self,
        entity_id: EntityId,
        score: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>, RankingError> {
        self.check_range(score)?;
        let previous = self.entries.get(&entity_id).map(|entry| entry.score);
        if previous != Some(score) {
            if let Some(old) = previous {
                self.index.remove(&RankKey::new(old, entity_id.clone()));
            }
            self.index.insert(RankKey::new(score, entity_id.clone()));
        }
        self.entries.insert(
            entity_id.clone(),
            ScoreEntry {
                entity_id,
                score,
                last_updated: at,
            },
        );
        self.revision = self.revision.saturating_add(1);
        Ok(previous)
    }

    /// Apply one stream record.
    ///
    /// Skips the record if `position` is already committed. Otherwise
    /// resolves the target score for the configured [`UpdateMode`], upserts
    /// it, counts the update in the activity sketch, and commits `position`.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::InvalidScore`] or
    /// [`RankingError::ScoreOverflow`]; the store and offsets are unchanged.
    pub fn apply_update(
        &mut self,
        update: &ScoreUpdate,
        position: Option<&StreamPosition>,
    ) -> Result<ApplyOutcome, RankingError> {
        if let Some(position) = position
            && self.is_committed(position)
        {
            return Ok(ApplyOutcome::Duplicate);
        }

        let target = match self.settings.mode {
            UpdateMode::Overwrite => update.score,
            UpdateMode::Increment => {
                let current = self.entries.get(&update.entity_id).map_or(0, |e| e.score);
                current
                    .checked_add(update.score)
                    .ok_or_else(|| RankingError::ScoreOverflow {
                        entity_id: update.entity_id.clone(),
                    })?
            }
        };

        let previous = self.upsert_at(update.entity_id.clone(), target, update.event_time)?;
        self.activity.add(update.entity_id.as_str(), 1);
        if let Some(position) = position {
            self.advance_offset(position);
        }
        Ok(ApplyOutcome::Applied {
            previous,
            score: target,
        })
    }

    /// Whether `position` is at or before the committed offset of its partition.
    pub fn is_committed(&self, position: &StreamPosition) -> bool {
        self.offsets
            .get(&position.partition)
            .is_some_and(|committed| position.offset <= *committed)
    }

    /// Commit `position` without applying a record and bump the revision.
    ///
    /// Used after a record is dead-lettered. Returns `false` and leaves the
    /// store unchanged if the offset would not move forward.
    pub fn commit_offset(&mut self, position: &StreamPosition) -> bool {
        let advanced = self.advance_offset(position);
        if advanced {
            self.revision = self.revision.saturating_add(1);
        }
        advanced
    }

    fn advance_offset(&mut self, position: &StreamPosition) -> bool {
        match self.offsets.get_mut(&position.partition) {
            Some(committed) if *committed >= position.offset => false,
            Some(committed) => {
                *committed = position.offset;
                true
            }
            None => {
                self.offsets
                    .insert(position.partition.clone(), position.offset);
                true
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// 1-based rank of `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::NotFound`] if the entity is not ranked.
    pub fn rank_of(&self, entity_id: &EntityId) -> Result<usize, RankingError> {
        let entry = self
            .entries
            .get(entity_id)
            .ok_or_else(|| RankingError::NotFound(entity_id.clone()))?;
        self.index
            .rank(&RankKey::new(entry.score, entity_id.clone()))
            .ok_or_else(|| RankingError::NotFound(entity_id.clone()))
    }

    /// Rank, total, and percentile of `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::NotFound`] if the entity is not ranked.
    pub fn percentile_of(&self, entity_id: &EntityId) -> Result<RankInfo, RankingError> {
        let rank = self.rank_of(entity_id)?;
        let entry = self
            .entries
            .get(entity_id)
            .cloned()
            .ok_or_else(|| RankingError::NotFound(entity_id.clone()))?;
        let total = self.len();
        Ok(RankInfo {
            entry,
            rank,
            total,
            percentile: percentile(rank, total),
        })
    }

    /// The `min(k, len, max_top_k)` highest entries in ranked order.
    pub fn top_k(&self, k: usize) -> Vec<ScoreEntry> {
        self.page(0, k).into_iter().map(|(_, entry)| entry).collect()
    }

    /// Up to `k` entries starting at 0-based `offset`, with their 1-based ranks.
    pub fn page(&self, offset: usize, k: usize) -> Vec<(usize, ScoreEntry)> {
        let k = k.min(self.settings.max_top_k);
        self.index
            .iter_from(offset)
            .take(k)
            .filter_map(|key| self.entries.get(&key.entity_id).cloned())
            .enumerate()
            .map(|(i, entry)| (offset.saturating_add(i).saturating_add(1), entry))
            .collect()
    }

    /// Estimated number of applied updates for `entity_id`.
    pub fn activity_of(&self, entity_id: &EntityId) -> u64 {
        self.activity.estimate(entity_id.as_str())
    }

    /// The `k` ranked entities with the largest activity estimates.
    ///
    /// Ordered by estimate descending, ties by entity id ascending.
    pub fn activity_top(&self, k: usize) -> Vec<(EntityId, u64)> {
        let k = k.min(self.settings.max_top_k);
        if k == 0 {
            return Vec::new();
        }
        let mut heap: BinaryHeap<Reverse<(u64, Reverse<&EntityId>)>> =
            BinaryHeap::with_capacity(k.saturating_add(1));
        for entity_id in self.entries.keys() {
            heap.push(Reverse((self.activity.estimate(entity_id.as_str()), Reverse(entity_id))));
            if heap.len() > k {
                heap.pop();
            }
        }
        heap.into_sorted_vec()
            .into_iter()
            .map(|Reverse((estimate, Reverse(entity_id)))| (entity_id.clone(), estimate))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Serialize the full state as snapshot number `sequence`.
    pub fn checkpoint(&self, sequence: u64) -> SnapshotFile {
        SnapshotFile {
            format: SNAPSHOT_FORMAT.to_owned(),
            sequence,
            revision: self.revision,
            captured_at: Utc::now(),
            offsets: self.offsets.clone(),
            entries: self
                .index
                .iter()
                .filter_map(|key| self.entries.get(&key.entity_id).cloned())
                .collect(),
            activity: Some(self.activity.to_state()),
        }
    }

    /// Rebuild a store from a snapshot.
    ///
    /// Entries keep their scores even if `settings` has since narrowed the
    /// valid range; the range applies to new updates only. A sketch whose
    /// dimensions differ from `settings` is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::UnsupportedSnapshot`] for an unknown format
    /// tag, [`RankingError::InvalidSnapshot`] for duplicate entities, or
    /// [`RankingError::Sketch`] for malformed sketch counters.
    pub fn restore(snapshot: SnapshotFile, settings: StoreSettings) -> Result<Self, RankingError> {
        if !snapshot.is_supported() {
            return Err(RankingError::UnsupportedSnapshot {
                format: snapshot.format,
            });
        }

        let mut store = Self::new(settings);
        for entry in snapshot.entries {
            if !store
                .index
                .insert(RankKey::new(entry.score, entry.entity_id.clone()))
                || store.entries.contains_key(&entry.entity_id)
            {
                return Err(RankingError::InvalidSnapshot(format!(
                    "duplicate entity {}",
                    entry.entity_id
                )));
            }
            store.entries.insert(entry.entity_id.clone(), entry);
        }

        if let Some(state) = snapshot.activity {
            let sketch = CountMinSketch::from_state(state)?;
            if sketch.width() == store.activity.width() && sketch.depth() == store.activity.depth()
            {
                store.activity = sketch;
            } else {
                warn!(
                    snapshot_width = sketch.width(),
                    snapshot_depth = sketch.depth(),
                    width = store.activity.width(),
                    depth = store.activity.depth(),
                    "sketch dimensions changed, activity counts reset"
                );
            }
        }

        store.revision = snapshot.revision;
        store.offsets = snapshot.offsets;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    fn update(raw: &str, score: i64) -> ScoreUpdate {
        ScoreUpdate {
            entity_id: id(raw),
            score,
            event_time: Utc::now(),
        }
    }

    fn settings(mode: UpdateMode) -> StoreSettings {
        StoreSettings {
            min_score: -1_000,
            max_score: 1_000,
            max_top_k: 50,
            mode,
            sketch_width: 64,
            sketch_depth: 4,
        }
    }

    fn ids(entries: &[ScoreEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.entity_id.as_str()).collect()
    }

    #[test]
    fn basic_ranking() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        assert!(store.upsert(id("A"), 100).is_ok());
        assert!(store.upsert(id("B"), 200).is_ok());
        assert!(store.upsert(id("C"), 150).is_ok());

        assert_eq!(ids(&store.top_k(2)), vec!["B", "C"]);
        assert_eq!(store.rank_of(&id("A")), Ok(3));
        assert_eq!(store.revision(), 3);
    }

    #[test]
    fn ties_break_by_entity_id() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        for raw in ["zed", "amy", "kim"] {
            assert!(store.upsert(id(raw), 10).is_ok());
        }
        assert_eq!(ids(&store.top_k(10)), vec!["amy", "kim", "zed"]);
    }

    #[test]
    fn overwrite_moves_entry() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        assert!(store.upsert(id("A"), 100).is_ok());
        assert!(store.upsert(id("B"), 200).is_ok());
        assert_eq!(store.upsert(id("A"), 300), Ok(Some(100)));
        assert_eq!(store.rank_of(&id("A")), Ok(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn upsert_is_idempotent_for_order() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        assert!(store.upsert(id("A"), 5).is_ok());
        assert!(store.upsert(id("B"), 7).is_ok());
        let before = ids(&store.top_k(10)).join(",");
        assert!(store.upsert(id("A"), 5).is_ok());
        assert_eq!(ids(&store.top_k(10)).join(","), before);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        let result = store.upsert(id("A"), 1_001);
        assert_eq!(
            result,
            Err(RankingError::InvalidScore {
                score: 1_001,
                min: -1_000,
                max: 1_000
            })
        );
        assert!(store.is_empty());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn unknown_entity_is_not_found() {
        let store = RankingStore::new(settings(UpdateMode::Overwrite));
        assert_eq!(store.rank_of(&id("ghost")), Err(RankingError::NotFound(id("ghost"))));
    }

    #[test]
    fn top_k_count_and_clamp() {
        let mut store = RankingStore::new(StoreSettings {
            max_top_k: 3,
            ..settings(UpdateMode::Overwrite)
        });
        assert!(store.top_k(5).is_empty());
        for i in 0..5 {
            assert!(store.upsert(id(&format!("e{i}")), i).is_ok());
        }
        assert_eq!(store.top_k(0).len(), 0);
        assert_eq!(store.top_k(2).len(), 2);
        assert_eq!(store.top_k(10).len(), 3);
    }

    #[test]
    fn page_reports_ranks() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        for (raw, score) in [("a", 5), ("b", 4), ("c", 3), ("d", 2)] {
            assert!(store.upsert(id(raw), score).is_ok());
        }
        let page = store.page(1, 2);
        let ranks: Vec<(usize, &str)> = page.iter().map(|(r, e)| (*r, e.entity_id.as_str())).collect();
        assert_eq!(ranks, vec![(2, "b"), (3, "c")]);
        assert!(store.page(10, 2).is_empty());
    }

    #[test]
    fn percentile_counts_self() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        for (raw, score) in [("a", 40), ("b", 30), ("c", 20), ("d", 10)] {
            assert!(store.upsert(id(raw), score).is_ok());
        }
        let top = store.percentile_of(&id("a")).ok();
        assert_eq!(top.as_ref().map(|i| (i.rank, i.total)), Some((1, 4)));
        assert!(top.is_some_and(|i| (i.percentile - 100.0).abs() < f64::EPSILON));
        let last = store.percentile_of(&id("d")).ok();
        assert!(last.is_some_and(|i| (i.percentile - 25.0).abs() < f64::EPSILON));
    }

    #[test]
    fn ranks_match_full_sort_under_random_updates() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        for _ in 0..3_000 {
            let raw = format!("p{}", rng.random_range(0..200));
            assert!(store.upsert(id(&raw), rng.random_range(-1_000..=1_000)).is_ok());
        }

        let mut expected: Vec<ScoreEntry> = store.entries.values().cloned().collect();
        expected.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.entity_id.cmp(&b.entity_id)));

        for (i, entry) in expected.iter().enumerate() {
            assert_eq!(store.rank_of(&entry.entity_id), Ok(i.saturating_add(1)));
        }
        assert_eq!(store.top_k(50), expected.get(..50).unwrap_or(&[]).to_vec());
    }

    #[test]
    fn apply_skips_committed_offsets() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        let first = StreamPosition::new("SCORES", 1);
        let second = StreamPosition::new("SCORES", 2);

        assert!(matches!(
            store.apply_update(&update("A", 10), Some(&first)),
            Ok(ApplyOutcome::Applied { previous: None, score: 10 })
        ));
        assert_eq!(
            store.apply_update(&update("A", 99), Some(&first)),
            Ok(ApplyOutcome::Duplicate)
        );
        assert_eq!(store.get(&id("A")).map(|e| e.score), Some(10));

        assert!(store.apply_update(&update("A", 20), Some(&second)).is_ok());
        assert_eq!(store.offsets().get("SCORES"), Some(&2));
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn invalid_update_leaves_offset_uncommitted() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        let pos = StreamPosition::new("SCORES", 1);
        let result = store.apply_update(&update("A", 5_000), Some(&pos));
        assert!(result.is_err_and(|e| e.is_validation()));
        assert!(!store.is_committed(&pos));
        assert!(store.commit_offset(&pos));
        assert_eq!(store.revision(), 1);
        assert!(!store.commit_offset(&StreamPosition::new("SCORES", 0)));
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn increment_mode_accumulates() {
        let mut store = RankingStore::new(settings(UpdateMode::Increment));
        assert!(store.apply_update(&update("song", 1), None).is_ok());
        assert!(store.apply_update(&update("song", 1), None).is_ok());
        assert!(store.apply_update(&update("song", 3), None).is_ok());
        assert_eq!(store.get(&id("song")).map(|e| e.score), Some(5));
        let over = store.apply_update(&update("song", 999), None);
        assert!(matches!(over, Err(RankingError::InvalidScore { score: 1_004, .. })));
        assert_eq!(store.get(&id("song")).map(|e| e.score), Some(5));
    }

    #[test]
    fn increment_overflow_is_rejected() {
        let mut store = RankingStore::new(StoreSettings {
            min_score: i64::MIN,
            max_score: i64::MAX,
            ..settings(UpdateMode::Increment)
        });
        assert!(store.apply_update(&update("x", i64::MAX), None).is_ok());
        assert_eq!(
            store.apply_update(&update("x", 1), None),
            Err(RankingError::ScoreOverflow { entity_id: id("x") })
        );
    }

    #[test]
    fn activity_ranks_by_update_count() {
        let mut store = RankingStore::new(StoreSettings {
            sketch_width: 1_000,
            sketch_depth: 5,
            ..settings(UpdateMode::Overwrite)
        });
        for (raw, times) in [("quiet", 1), ("busy", 4), ("mid", 2), ("also-mid", 2)] {
            for n in 0..times {
                assert!(store.apply_update(&update(raw, n), None).is_ok());
            }
        }
        let top = store.activity_top(3);
        let names: Vec<(&str, u64)> = top.iter().map(|(e, n)| (e.as_str(), *n)).collect();
        assert_eq!(names, vec![("busy", 4), ("also-mid", 2), ("mid", 2)]);
        assert_eq!(store.activity_of(&id("quiet")), 1);
        assert!(store.activity_top(0).is_empty());
    }

    #[test]
    fn checkpoint_restore_preserves_state() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        for (i, (raw, score)) in [("a", 3), ("b", 9), ("c", 6)].into_iter().enumerate() {
            let pos = StreamPosition::new("SCORES", u64::try_from(i).unwrap_or(0).saturating_add(1));
            assert!(store.apply_update(&update(raw, score), Some(&pos)).is_ok());
        }
        let snapshot = store.checkpoint(7);
        assert_eq!(snapshot.sequence, 7);
        assert_eq!(ids(&snapshot.entries), vec!["b", "c", "a"]);

        let restored = RankingStore::restore(snapshot, settings(UpdateMode::Overwrite));
        assert!(restored.is_ok());
        let restored = restored.unwrap();
        assert_eq!(restored.top_k(10), store.top_k(10));
        assert_eq!(restored.revision(), store.revision());
        assert_eq!(restored.offsets(), store.offsets());
        assert_eq!(restored.activity_of(&id("b")), 1);
    }

    #[test]
    fn restore_rejects_unknown_format_and_duplicates() {
        let store = RankingStore::new(settings(UpdateMode::Overwrite));
        let mut snapshot = store.checkpoint(1);
        snapshot.format = "leaderboard-snapshot/v99".to_owned();
        assert!(matches!(
            RankingStore::restore(snapshot, settings(UpdateMode::Overwrite)),
            Err(RankingError::UnsupportedSnapshot { .. })
        ));

        let mut snapshot = store.checkpoint(1);
        let entry = ScoreEntry {
            entity_id: id("dup"),
            score: 1,
            last_updated: Utc::now(),
        };
        snapshot.entries = vec![entry.clone(), ScoreEntry { score: 2, ..entry }];
        assert!(matches!(
            RankingStore::restore(snapshot, settings(UpdateMode::Overwrite)),
            Err(RankingError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn restore_resets_sketch_with_new_dimensions() {
        let mut store = RankingStore::new(settings(UpdateMode::Overwrite));
        assert!(store.apply_update(&update("a", 1), None).is_ok());
        let snapshot = store.checkpoint(1);
        let wider = StoreSettings {
            sketch_width: 128,
            ..settings(UpdateMode::Overwrite)
        };
        let restored = RankingStore::restore(snapshot, wider).ok();
        assert_eq!(restored.as_ref().map(RankingStore::len), Some(1));
        assert_eq!(restored.map(|s| s.activity_of(&id("a"))), Some(0));
    }
}
