//! Count-min sketch for approximate per-entity activity counts.
//!
//! `depth` rows of `width` counters. Row `r` maps an item to the column
//! `sha256(r || item) mod width`, so each row behaves as an independent hash
//! function. Estimates are the minimum over rows and are never below the
//! true count.

use leaderboard_types::SketchState;
use sha2::{Digest, Sha256};

/// Errors from combining or restoring sketches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SketchError {
    /// Two sketches with different dimensions cannot be merged.
    #[error("sketch dimensions differ: {expected_width}x{expected_depth} vs {found_width}x{found_depth}")]
    DimensionMismatch {
        /// Width of the receiving sketch.
        expected_width: usize,
        /// Depth of the receiving sketch.
        expected_depth: usize,
        /// Width of the other sketch.
        found_width: usize,
        /// Depth of the other sketch.
        found_depth: usize,
    },

    /// Serialized counters do not match the declared dimensions.
    #[error("malformed sketch state: {0}")]
    Malformed(String),
}

/// Fixed-size frequency estimator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMinSketch {
    width: usize,
    depth: usize,
    counters: Vec<Vec<u64>>,
}

impl CountMinSketch {
    /// Create a zeroed sketch. Zero dimensions are raised to one.
    pub fn new(width: usize, depth: usize) -> Self {
        let width = width.max(1);
        let depth = depth.max(1);
        Self {
            width,
            depth,
            counters: vec![vec![0; width]; depth],
        }
    }

    /// Counters per row.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    fn column(&self, row: usize, item: &str) -> usize {
        let mut hasher = Sha256::new();
        hasher.update(row.to_string().as_bytes());
        hasher.update(item.as_bytes());
        let digest = hasher.finalize();
        let prefix = digest.first_chunk::<8>().map_or(0, |b| u64::from_be_bytes(*b));
        let width = u64::try_from(self.width).unwrap_or(u64::MAX);
        usize::try_from(prefix.checked_rem(width).unwrap_or(0)).unwrap_or(0)
    }

    /// Record `count` occurrences of `item`.
    pub fn add(&mut self, item: &str, count: u64) {
        for row in 0..self.depth {
            let col = self.column(row, item);
            if let Some(cell) = self.counters.get_mut(row).and_then(|r| r.get_mut(col)) {
                *cell = cell.saturating_add(count);
            }
        }
    }

    /// Estimated number of occurrences of `item`.
    pub fn estimate(&self, item: &str) -> u64 {
        (0..self.depth)
            .filter_map(|row| {
                let col = self.column(row, item);
                self.counters.get(row).and_then(|r| r.get(col)).copied()
            })
            .min()
            .unwrap_or(0)
    }

    /// Add every counter of `other` into `self`.
    ///
    /// # Errors
    ///
    /// Returns [`SketchError::DimensionMismatch`] if the sketches differ in
    /// width or depth.
    pub fn merge(&mut self, other: &Self) -> Result<(), SketchError> {
        if self.width != other.width || self.depth != other.depth {
            return Err(SketchError::DimensionMismatch {
                expected_width: self.width,
                expected_depth: self.depth,
                found_width: other.width,
                found_depth: other.depth,
            });
        }
        for (mine, theirs) in self.counters.iter_mut().zip(&other.counters) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a = a.saturating_add(*b);
            }
        }
        Ok(())
    }

    /// Export the raw counters.
    pub fn to_state(&self) -> SketchState {
        SketchState {
            width: self.width,
            depth: self.depth,
            counters: self.counters.clone(),
        }
    }

    /// Rebuild a sketch from exported counters.
    ///
    /// # Errors
    ///
    /// Returns [`SketchError::Malformed`] if a dimension is zero or the
    /// counter matrix does not match the declared dimensions.
    pub fn from_state(state: SketchState) -> Result<Self, SketchError> {
        if state.width == 0 || state.depth == 0 {
            return Err(SketchError::Malformed("zero dimension".to_owned()));
        }
        if state.counters.len() != state.depth {
            return Err(SketchError::Malformed(format!(
                "expected {} rows, found {}",
                state.depth,
                state.counters.len()
            )));
        }
        if let Some(row) = state.counters.iter().find(|r| r.len() != state.width) {
            return Err(SketchError::Malformed(format!(
                "expected rows of {} counters, found {}",
                state.width,
                row.len()
            )));
        }
        Ok(Self {
            width: state.width,
            depth: state.depth,
            counters: state.counters,
        })
    }
}
