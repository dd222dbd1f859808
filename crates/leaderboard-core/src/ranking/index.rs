//! Order-statistic index over ranked keys.
//!
//! [`RankIndex`] is a treap (randomized balanced binary search tree) whose
//! nodes carry their subtree size. Keys are ordered by the ranked view
//! (`score` descending, `entity_id` ascending), so the in-order position of
//! a key is its 0-based rank.
//!
//! | Operation | Cost (expected) |
//! |-----------|-----------------|
//! | `insert` / `remove` | O(log n) |
//! | `position` / `rank` | O(log n) |
//! | `iter_from(offset)` | O(log n) to position, O(1) amortized per item |
//!
//! Nodes are owned `Box`es; structural changes go through `split` and
//! `merge`, which keep both the heap order on priorities and the subtree
//! sizes consistent.

use core::cmp::Ordering;

use leaderboard_types::EntityId;

/// Sort key of the ranked view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankKey {
    /// Score of the entity.
    pub score: i64,
    /// Tie-break.
    pub entity_id: EntityId,
}

impl RankKey {
    /// Build a key from its parts.
    pub const fn new(score: i64, entity_id: EntityId) -> Self {
        Self { score, entity_id }
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.entity_id.cmp(&other.entity_id))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type Link = Option<Box<Node>>;

#[derive(Debug)]
struct Node {
    key: RankKey,
    priority: u64,
    size: usize,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(key: RankKey, priority: u64) -> Box<Self> {
        Box::new(Self {
            key,
            priority,
            size: 1,
            left: None,
            right: None,
        })
    }

    fn refresh(&mut self) {
        self.size = subtree_size(&self.left)
            .saturating_add(subtree_size(&self.right))
            .saturating_add(1);
    }
}

fn subtree_size(link: &Link) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

/// Split `link` into keys for which `goes_left` holds and the rest.
///
/// `goes_left` must be monotone over the key order (true for a prefix).
fn split<F>(link: Link, goes_left: &F) -> (Link, Link)
where
    F: Fn(&RankKey) -> bool,
{
    let Some(mut node) = link else {
        return (None, None);
    };
    if goes_left(&node.key) {
        let (lower, upper) = split(node.right.take(), goes_left);
        node.right = lower;
        node.refresh();
        (Some(node), upper)
    } else {
        let (lower, upper) = split(node.left.take(), goes_left);
        node.left = upper;
        node.refresh();
        (lower, Some(node))
    }
}

/// Join two treaps where every key of `lower` sorts before every key of `upper`.
fn merge(lower: Link, upper: Link) -> Link {
    match (lower, upper) {
        (None, upper) => upper,
        (lower, None) => lower,
        (Some(mut lo), Some(mut hi)) => {
            if lo.priority > hi.priority {
                lo.right = merge(lo.right.take(), Some(hi));
                lo.refresh();
                Some(lo)
            } else {
                hi.left = merge(Some(lo), hi.left.take());
                hi.refresh();
                Some(hi)
            }
        }
    }
}

/// Size-augmented treap keyed by [`RankKey`].
#[derive(Debug, Default)]
pub struct RankIndex {
    root: Link,
}

impl RankIndex {
    /// Create an empty index.
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        subtree_size(&self.root)
    }

    /// Whether the index holds no keys.
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert `key`. Returns `false` if it was already present.
    pub fn insert(&mut self, key: RankKey) -> bool {
        if self.position(&key).is_some() {
            return false;
        }
        let (lower, upper) = split(self.root.take(), &|k: &RankKey| *k < key);
        let node = Node::leaf(key, rand::random::<u64>());
        self.root = merge(merge(lower, Some(node)), upper);
        true
    }

    /// Remove `key`. Returns `false` if it was not present.
    pub fn remove(&mut self, key: &RankKey) -> bool {
        let (lower, rest) = split(self.root.take(), &|k: &RankKey| k < key);
        let (found, upper) = split(rest, &|k: &RankKey| k <= key);
        self.root = merge(lower, upper);
        found.is_some()
    }

    /// 0-based position of `key` in ranked order.
    pub fn position(&self, key: &RankKey) -> Option<usize> {
        let mut before = 0_usize;
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            match key.cmp(&node.key) {
                Ordering::Less => cursor = node.left.as_deref(),
                Ordering::Equal => return Some(before.saturating_add(subtree_size(&node.left))),
                Ordering::Greater => {
                    before = before
                        .saturating_add(subtree_size(&node.left))
                        .saturating_add(1);
                    cursor = node.right.as_deref();
                }
            }
        }
        None
    }

    /// 1-based rank of `key`.
    pub fn rank(&self, key: &RankKey) -> Option<usize> {
        self.position(key).map(|p| p.saturating_add(1))
    }

    /// Iterate all keys in ranked order.
    pub fn iter(&self) -> Iter<'_> {
        self.iter_from(0)
    }

    /// Iterate keys in ranked order starting at 0-based `offset`.
    pub fn iter_from(&self, offset: usize) -> Iter<'_> {
        let mut stack = Vec::new();
        let mut skip = offset;
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            let left = subtree_size(&node.left);
            match skip.cmp(&left) {
                Ordering::Less => {
                    stack.push(node);
                    cursor = node.left.as_deref();
                }
                Ordering::Equal => {
                    stack.push(node);
                    break;
                }
                Ordering::Greater => {
                    skip = skip.saturating_sub(left).saturating_sub(1);
                    cursor = node.right.as_deref();
                }
            }
        }
        Iter { stack }
    }
}

/// In-order iterator over a [`RankIndex`].
#[derive(Debug)]
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RankKey;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let mut cursor = node.right.as_deref();
        while let Some(child) = cursor {
            self.stack.push(child);
            cursor = child.left.as_deref();
        }
        Some(&node.key)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn key(score: i64, id: &str) -> RankKey {
        RankKey::new(score, EntityId::parse(id).unwrap())
    }

    #[test]
    fn orders_by_score_then_id() {
        let mut index = RankIndex::new();
        assert!(index.insert(key(100, "A")));
        assert!(index.insert(key(200, "B")));
        assert!(index.insert(key(150, "C")));
        assert!(index.insert(key(150, "B2")));

        let ids: Vec<&str> = index.iter().map(|k| k.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "B2", "C", "A"]);
        assert_eq!(index.rank(&key(100, "A")), Some(4));
        assert_eq!(index.rank(&key(150, "C")), Some(3));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut index = RankIndex::new();
        assert!(index.insert(key(1, "x")));
        assert!(!index.insert(key(1, "x")));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let mut index = RankIndex::new();
        index.insert(key(1, "x"));
        assert!(!index.remove(&key(2, "x")));
        assert!(index.remove(&key(1, "x")));
        assert!(index.is_empty());
    }

    #[test]
    fn iter_from_every_offset() {
        let mut index = RankIndex::new();
        for (i, id) in ["a", "b", "c", "d", "e", "f", "g"].iter().enumerate() {
            index.insert(key(i64::try_from(i).unwrap_or(0), id));
        }
        let all: Vec<RankKey> = index.iter().cloned().collect();
        for offset in 0..=all.len() {
            let tail: Vec<RankKey> = index.iter_from(offset).cloned().collect();
            assert_eq!(tail.as_slice(), all.get(offset..).unwrap_or(&[]));
        }
        assert_eq!(index.iter_from(100).count(), 0);
    }

    #[test]
    fn agrees_with_sorted_reference_under_random_churn() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut index = RankIndex::new();
        let mut reference: Vec<RankKey> = Vec::new();

        for _ in 0..2_000 {
            let k = key(rng.random_range(-20..20), &format!("e{}", rng.random_range(0..60)));
            if rng.random_bool(0.3) {
                let removed = index.remove(&k);
                let before = reference.len();
                reference.retain(|r| *r != k);
                assert_eq!(removed, reference.len() != before);
            } else {
                let inserted = index.insert(k.clone());
                assert_eq!(inserted, !reference.contains(&k));
                if inserted {
                    reference.push(k);
                }
            }
        }

        reference.sort();
        let ordered: Vec<RankKey> = index.iter().cloned().collect();
        assert_eq!(ordered, reference);
        for (i, k) in reference.iter().enumerate() {
            assert_eq!(index.rank(k), Some(i.saturating_add(1)));
        }
    }
}
