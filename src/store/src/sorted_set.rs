// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::collections::{BTreeSet, HashMap};

/// A sorted set: unique members ordered by score, with ties broken by the
/// members' own byte order. Equal-score ordering is therefore deterministic
/// but not configurable.
#[derive(Debug, Default)]
pub struct SortedSet {
    scores: HashMap<Vec<u8>, f64>,
    ordered: BTreeSet<Entry>,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    score: f64,
    member: Vec<u8>,
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.cmp(&other.member))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates a member. Returns true if the member was new.
    pub fn insert(&mut self, member: &[u8], score: f64) -> bool {
        if let Some(old) = self.scores.insert(member.to_vec(), score) {
            self.ordered.remove(&Entry {
                score: old,
                member: member.to_vec(),
            });
            self.ordered.insert(Entry {
                score,
                member: member.to_vec(),
            });
            false
        } else {
            self.ordered.insert(Entry {
                score,
                member: member.to_vec(),
            });
            true
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        if let Some(score) = self.scores.remove(member) {
            self.ordered.remove(&Entry {
                score,
                member: member.to_vec(),
            });
            true
        } else {
            false
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The member with the lowest score.
    pub fn first(&self) -> Option<(&[u8], f64)> {
        self.ordered
            .iter()
            .next()
            .map(|e| (e.member.as_slice(), e.score))
    }

    /// Members by ascending rank, `start..=stop`, with negative indices
    /// counting back from the end.
    pub fn range(&self, start: i64, stop: i64) -> Vec<(&[u8], f64)> {
        let len = self.ordered.len() as i64;
        if len == 0 {
            return Vec::new();
        }
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
        if start > stop || start >= len || stop < 0 {
            return Vec::new();
        }
        self.ordered
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|e| (e.member.as_slice(), e.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_by_score() {
        let mut set = SortedSet::new();
        assert!(set.insert(b"b", 3.0));
        assert!(set.insert(b"a", 1.0));
        assert!(set.insert(b"c", 2.0));
        assert_eq!(set.first(), Some((&b"a"[..], 1.0)));

        set.remove(b"a");
        assert_eq!(set.first(), Some((&b"c"[..], 2.0)));
    }

    #[test]
    fn score_update_reorders() {
        let mut set = SortedSet::new();
        set.insert(b"a", 1.0);
        set.insert(b"b", 2.0);
        assert!(!set.insert(b"a", 5.0));
        assert_eq!(set.first(), Some((&b"b"[..], 2.0)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn equal_scores_break_ties_by_member() {
        let mut set = SortedSet::new();
        set.insert(b"y", 1.0);
        set.insert(b"x", 1.0);
        assert_eq!(set.first(), Some((&b"x"[..], 1.0)));
    }

    #[test]
    fn range_indices() {
        let mut set = SortedSet::new();
        set.insert(b"a", 1.0);
        set.insert(b"b", 2.0);
        set.insert(b"c", 3.0);

        let all: Vec<_> = set.range(0, -1).iter().map(|(m, _)| m.to_vec()).collect();
        assert_eq!(all, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        let head = set.range(0, 0);
        assert_eq!(head, vec![(&b"a"[..], 1.0)]);
    }
}
