// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Keyed collections with weighted random selection.
//!
//! Two tiers: [`WeightedSet`] is a standalone collection of weighted keys,
//! [`WeightedMultimap`] maps keys to weighted sub-sets with the rule that an
//! emptied sub-set removes its outer entry.

use rand::Rng;
use std::collections::HashMap;
use std::hash::Hash;

/// A set of keys, each carrying a non-negative weight, supporting a weighted
/// random draw in O(k).
///
/// Entries keep their insertion order so that a seeded RNG produces the same
/// sequence of picks from run to run.
#[derive(Clone, Debug)]
pub struct WeightedSet<K> {
    entries: Vec<(K, f64)>,
    index: HashMap<K, usize>,
    total: f64,
}

impl<K> Default for WeightedSet<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            total: 0.0,
        }
    }
}

impl<K: Eq + Hash + Clone> WeightedSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `key` with `weight`, replacing any previous weight. The
    /// running total tracks the delta.
    pub fn add(&mut self, key: K, weight: f64) {
        assert!(weight >= 0.0, "weight is negative");
        match self.index.get(&key) {
            Some(&i) => {
                self.total += weight - self.entries[i].1;
                self.entries[i].1 = weight;
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, weight));
                self.total += weight;
            }
        }
    }

    /// Removes `key`, returning its weight if present.
    pub fn remove(&mut self, key: &K) -> Option<f64> {
        let i = self.index.remove(key)?;
        let (_, weight) = self.entries.swap_remove(i);
        if let Some((moved, _)) = self.entries.get(i) {
            self.index.insert(moved.clone(), i);
        }
        self.total -= weight;
        Some(weight)
    }

    /// Keeps only the keys for which `keep` holds, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        let mut kept = Vec::with_capacity(self.entries.len());
        let mut total = 0.0;
        self.index.clear();
        for (key, weight) in self.entries.drain(..) {
            if keep(&key) {
                self.index.insert(key.clone(), kept.len());
                total += weight;
                kept.push((key, weight));
            }
        }
        self.entries = kept;
        self.total = total;
    }

    /// The weight of `key`; absent keys weigh 0.
    pub fn weight(&self, key: &K) -> f64 {
        self.index.get(key).map_or(0.0, |&i| self.entries[i].1)
    }

    /// The sum of all weights, maintained incrementally.
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> {
        self.entries.iter().map(|(k, w)| (k, *w))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Draws a key with probability proportional to its weight, using the
    /// closed-upper convention `u = (1 - r) * total`, `r in [0, 1)`, so a key
    /// whose cumulative weight equals the total is still reachable.
    ///
    /// Returns `None` if the set is empty or carries no weight.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&K> {
        if self.entries.is_empty() || self.total <= 0.0 {
            return None;
        }
        let mut u = (1.0 - rng.gen::<f64>()) * self.total;
        let mut last = None;
        for (key, weight) in &self.entries {
            if *weight <= 0.0 {
                continue;
            }
            last = Some(key);
            if u <= *weight {
                return Some(key);
            }
            u -= weight;
        }
        // Float drift can exhaust the walk; the last positive key covers it.
        last
    }
}

/// A multimap from keys to weighted sub-sets of values.
///
/// An emptied sub-set removes its outer entry, so the key set always equals
/// the set of non-empty sub-sets.
#[derive(Clone, Debug)]
pub struct WeightedMultimap<K, V> {
    map: HashMap<K, WeightedSet<V>>,
}

impl<K, V> Default for WeightedMultimap<K, V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Eq + Hash + Clone> WeightedMultimap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn insert(&mut self, key: K, value: V, weight: f64) {
        self.map.entry(key).or_default().add(value, weight);
    }

    /// Removes `value` under `key`; dropping the last value drops the key.
    pub fn remove(&mut self, key: &K, value: &V) -> Option<f64> {
        let set = self.map.get_mut(key)?;
        let weight = set.remove(value);
        if set.is_empty() {
            self.map.remove(key);
        }
        weight
    }

    pub fn get(&self, key: &K) -> Option<&WeightedSet<V>> {
        self.map.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    /// The weight of `value` under `key`; unrelated pairs weigh 0.
    pub fn weight(&self, key: &K, value: &V) -> f64 {
        self.map.get(key).map_or(0.0, |set| set.weight(value))
    }

    /// The total weight of the sub-set under `key`.
    pub fn key_weight(&self, key: &K) -> f64 {
        self.map.get(key).map_or(0.0, |set| set.total())
    }

    /// Draws a value from the sub-set under `key`, biased by weight.
    /// Returns `None` if the key is absent or its sub-set carries no weight.
    pub fn pick<R: Rng + ?Sized>(&self, key: &K, rng: &mut R) -> Option<&V> {
        self.map.get(key)?.pick(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn add_tracks_total() {
        let mut set = WeightedSet::new();
        set.add("a", 1.0);
        set.add("b", 2.0);
        assert_eq!(set.total(), 3.0);
        // replacing adjusts, never double counts
        set.add("a", 4.0);
        assert_eq!(set.total(), 6.0);
        assert_eq!(set.weight(&"a"), 4.0);
    }

    #[test]
    fn add_then_remove_is_a_noop_on_total() {
        let mut set = WeightedSet::new();
        set.add("a", 1.5);
        set.add("b", 2.5);
        set.add("c", 3.0);
        set.remove(&"c");
        set.remove(&"b");
        assert!((set.total() - 1.5).abs() < 1e-9);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn retain_drops_weight_of_removed_keys() {
        let mut set = WeightedSet::new();
        set.add(1, 1.0);
        set.add(2, 2.0);
        set.add(3, 3.0);
        set.retain(|k| *k != 2);
        assert_eq!(set.total(), 4.0);
        assert_eq!(set.weight(&2), 0.0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn pick_on_empty_or_zero_weight_fails() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        let mut set: WeightedSet<u32> = WeightedSet::new();
        assert!(set.pick(&mut rng).is_none());
        set.add(1, 0.0);
        assert!(set.pick(&mut rng).is_none());
    }

    #[test]
    fn pick_skips_zero_weight_keys() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        let mut set = WeightedSet::new();
        set.add("zero", 0.0);
        set.add("one", 1.0);
        for _ in 0..100 {
            assert_eq!(set.pick(&mut rng), Some(&"one"));
        }
    }

    #[test]
    fn pick_frequencies_match_weights() {
        // Three keys weighted 1:2:3 sampled 60,000 times land within two
        // percentage points of 1/6, 2/6, 3/6.
        let mut rng = Xoshiro256StarStar::seed_from_u64(0x5eed);
        let mut set = WeightedSet::new();
        set.add("a", 1.0);
        set.add("b", 2.0);
        set.add("c", 3.0);
        let mut counts = HashMap::new();
        let trials = 60_000;
        for _ in 0..trials {
            let key = set.pick(&mut rng).unwrap();
            *counts.entry(*key).or_insert(0usize) += 1;
        }
        for (key, expected) in [("a", 1.0 / 6.0), ("b", 2.0 / 6.0), ("c", 3.0 / 6.0)] {
            let observed = counts[key] as f64 / trials as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "key {} observed {} expected {}",
                key,
                observed,
                expected
            );
        }
    }

    #[test]
    fn multimap_drops_empty_shells() {
        let mut map = WeightedMultimap::new();
        map.insert("out", "in1", 2.0);
        map.insert("out", "in2", 3.0);
        assert_eq!(map.key_weight(&"out"), 5.0);
        map.remove(&"out", &"in1");
        assert_eq!(map.key_weight(&"out"), 3.0);
        map.remove(&"out", &"in2");
        assert!(map.get(&"out").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn multimap_pick_is_per_key() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let mut map = WeightedMultimap::new();
        map.insert("x", 1, 1.0);
        map.insert("y", 2, 1.0);
        assert_eq!(map.pick(&"x", &mut rng), Some(&1));
        assert_eq!(map.pick(&"y", &mut rng), Some(&2));
        assert_eq!(map.pick(&"z", &mut rng), None);
    }
}
