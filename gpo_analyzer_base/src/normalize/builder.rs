//! Insertion-ordered accumulator keyed by identifiers discovered while walking

use indexmap::IndexMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct OrderedBuilder<K, V> {
    entries: IndexMap<K, V>,
}

impl<K, V> Default for OrderedBuilder<K, V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq, V: Default> OrderedBuilder<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key`, created empty on first use; first use fixes its position
    pub fn upsert(&mut self, key: K) -> &mut V {
        self.entries.entry(key).or_default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.entries.into_values()
    }
}

impl<K, V> IntoIterator for OrderedBuilder<K, V> {
    type Item = (K, V);
    type IntoIter = indexmap::map::IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
