use std::collections::{BTreeSet, HashMap};

use annotator_core::{Fix, Location};

/// Raw result of evaluating one tree, before the override penalty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEffect {
    fingerprint: u64,
    pub local_effect: i32,
    pub reported: Vec<Fix>,
}

/// Evaluations keyed by tree. An entry only answers while the errors in the
/// tree's regions still hash to the fingerprint it was stored with.
#[derive(Debug, Default)]
pub struct EffectCache {
    entries: HashMap<BTreeSet<Location>, CachedEffect>,
    hits: u32,
}

impl EffectCache {
    pub fn get(&mut self, tree: &BTreeSet<Location>, fingerprint: u64) -> Option<CachedEffect> {
        let hit = self
            .entries
            .get(tree)
            .filter(|entry| entry.fingerprint == fingerprint)
            .cloned();
        if hit.is_some() {
            self.hits += 1;
        }
        hit
    }

    pub fn insert(&mut self, tree: BTreeSet<Location>, fingerprint: u64, local_effect: i32, reported: Vec<Fix>) {
        self.entries.insert(
            tree,
            CachedEffect {
                fingerprint,
                local_effect,
                reported,
            },
        );
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_fingerprints_miss() {
        let tree = BTreeSet::from([Location::method("a.C", "/C.java", "get()")]);
        let mut cache = EffectCache::default();
        cache.insert(tree.clone(), 7, -1, Vec::new());

        assert_eq!(cache.get(&tree, 7).map(|hit| hit.local_effect), Some(-1));
        assert!(cache.get(&tree, 8).is_none());
        assert!(cache.get(&BTreeSet::new(), 7).is_none());
        assert_eq!(cache.hits(), 1);
    }
}
