use std::collections::{HashMap, HashSet};

use crate::classification::domain::classification::Classification;
use crate::shared::region::RegionKey;

/// Latest known classification per region key.
///
/// Owned and mutated by a single writer (the reconciler); readers get
/// copies through snapshots. A missing key means "not classified yet or
/// classification failed"; the two are not distinguished.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassificationStore {
    entries: HashMap<RegionKey, Classification>,
}

impl ClassificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, key: RegionKey, classification: Classification) {
        self.entries.insert(key, classification);
    }

    pub fn remove(&mut self, key: &RegionKey) -> Option<Classification> {
        self.entries.remove(key)
    }

    /// Drops every entry whose key is not in `keep`. Returns how many were removed.
    pub fn retain_keys(&mut self, keep: &HashSet<RegionKey>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| keep.contains(key));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &RegionKey) -> Option<&Classification> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &RegionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> Vec<RegionKey> {
        let mut keys: Vec<RegionKey> = self.entries.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn to_map(&self) -> HashMap<RegionKey, Classification> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::classification::MaskLabel;

    fn masked(confidence: f32) -> Classification {
        Classification::new(MaskLabel::HasMask, confidence, "with_mask")
    }

    #[test]
    fn test_upsert_overwrites_existing_key() {
        let mut store = ClassificationStore::new();
        store.upsert(RegionKey(0), masked(0.5));
        store.upsert(RegionKey(0), masked(0.8));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&RegionKey(0)), Some(&masked(0.8)));
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let mut store = ClassificationStore::new();
        assert!(store.remove(&RegionKey(3)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_retain_keys_prunes_everything_else() {
        let mut store = ClassificationStore::new();
        for i in 0..4 {
            store.upsert(RegionKey(i), masked(0.9));
        }

        let removed = store.retain_keys(&HashSet::from([RegionKey(1), RegionKey(7)]));

        assert_eq!(removed, 3);
        assert_eq!(store.keys(), vec![RegionKey(1)]);
    }

    #[test]
    fn test_retain_with_empty_set_clears() {
        let mut store = ClassificationStore::new();
        store.upsert(RegionKey(0), masked(0.9));
        assert_eq!(store.retain_keys(&HashSet::new()), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_keys_are_sorted() {
        let mut store = ClassificationStore::new();
        store.upsert(RegionKey(2), masked(0.9));
        store.upsert(RegionKey(0), masked(0.9));
        store.upsert(RegionKey(1), masked(0.9));
        assert_eq!(store.keys(), vec![RegionKey(0), RegionKey(1), RegionKey(2)]);
    }
}
