//! List, set and map properties built from collector chains.
//!
//! A collection property records each `add`, `append`, `put` or exclusion as a
//! collector appended to a persistent chain. Reading the property folds the
//! chain oldest to newest into a fresh accumulator. The three container kinds
//! share that engine through [`Accumulator`].

mod chain;
mod collector;
mod map;
mod property;
mod supplier;

pub use map::MapProperty;
pub use property::{CollectionProperty, ListProperty, SetProperty};

use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

use crate::value::Data;

/// A container that collection properties accumulate into.
pub trait Accumulator: Data + Default {
  /// What a single collector contributes.
  type Item: Data;

  /// What identifies an item for key queries.
  type Key: Data;

  /// Short lowercase name used in descriptions.
  const KIND: &'static str;

  fn insert(&mut self, item: Self::Item);

  fn for_each_item(&self, visit: &mut dyn FnMut(&Self::Item));

  fn retain_items(&mut self, keep: &mut dyn FnMut(&Self::Item) -> bool);

  fn size(&self) -> usize;

  fn key_of(item: &Self::Item) -> Self::Key;

  fn extend_from(&mut self, other: &Self) {
    other.for_each_item(&mut |item| self.insert(item.clone()));
  }

  fn from_items(items: impl IntoIterator<Item = Self::Item>) -> Self {
    let mut accumulator = Self::default();
    for item in items {
      accumulator.insert(item);
    }
    accumulator
  }
}

impl<T: Data> Accumulator for Vec<T> {
  type Item = T;
  type Key = T;
  const KIND: &'static str = "list";

  fn insert(&mut self, item: T) {
    self.push(item);
  }

  fn for_each_item(&self, visit: &mut dyn FnMut(&T)) {
    self.iter().for_each(visit);
  }

  fn retain_items(&mut self, keep: &mut dyn FnMut(&T) -> bool) {
    self.retain(|item| keep(item));
  }

  fn size(&self) -> usize {
    self.len()
  }

  fn key_of(item: &T) -> T {
    item.clone()
  }
}

impl<T: Data + Hash + Eq> Accumulator for IndexSet<T> {
  type Item = T;
  type Key = T;
  const KIND: &'static str = "set";

  fn insert(&mut self, item: T) {
    IndexSet::insert(self, item);
  }

  fn for_each_item(&self, visit: &mut dyn FnMut(&T)) {
    self.iter().for_each(visit);
  }

  fn retain_items(&mut self, keep: &mut dyn FnMut(&T) -> bool) {
    self.retain(|item| keep(item));
  }

  fn size(&self) -> usize {
    self.len()
  }

  fn key_of(item: &T) -> T {
    item.clone()
  }
}

/// Later entries replace the value of an existing key but keep its position.
impl<K: Data + Hash + Eq, V: Data> Accumulator for IndexMap<K, V> {
  type Item = (K, V);
  type Key = K;
  const KIND: &'static str = "map";

  fn insert(&mut self, (key, value): (K, V)) {
    IndexMap::insert(self, key, value);
  }

  fn for_each_item(&self, visit: &mut dyn FnMut(&(K, V))) {
    for (key, value) in self {
      visit(&(key.clone(), value.clone()));
    }
  }

  fn retain_items(&mut self, keep: &mut dyn FnMut(&(K, V)) -> bool) {
    self.retain(|key, value| keep(&(key.clone(), value.clone())));
  }

  fn size(&self) -> usize {
    self.len()
  }

  fn key_of(item: &(K, V)) -> K {
    item.0.clone()
  }
}
