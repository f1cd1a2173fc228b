//! Map properties built from keyed entries.

use std::hash::Hash;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use super::collector::Collector;
use super::property::{CollectionCore, present_size};
use crate::error::ProviderError;
use crate::eval::EvaluationOwner;
use crate::producer::ValueProducer;
use crate::property::{DetachedHost, PropertyHost, property_api};
use crate::provider::{Provider, ProviderInternal, ValueConsumer};
use crate::value::{Data, DisplayName, ExecutionTimeValue, Value};

/// A property whose value is an insertion-ordered map built up from entries.
///
/// A later entry for an existing key replaces its value but keeps the key's
/// original position.
pub struct MapProperty<K: Data + Hash + Eq, V: Data> {
  core: Arc<CollectionCore<IndexMap<K, V>>>,
  provider: Provider<IndexMap<K, V>>,
}

impl<K: Data + Hash + Eq, V: Data> Clone for MapProperty<K, V> {
  fn clone(&self) -> Self {
    Self {
      core: self.core.clone(),
      provider: self.provider.clone(),
    }
  }
}

impl<K: Data + Hash + Eq, V: Data> Default for MapProperty<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K: Data + Hash + Eq, V: Data> MapProperty<K, V> {
  pub fn new() -> Self {
    Self::with_host(Arc::new(DetachedHost))
  }

  pub fn named(name: &str) -> Self {
    let property = Self::new();
    property.attach_display_name(DisplayName::property(name));
    property
  }

  pub fn with_host(host: Arc<dyn PropertyHost>) -> Self {
    let core = Arc::new(CollectionCore::new_collection(host));
    let provider = Provider::from_arc(core.clone());
    Self { core, provider }
  }

  property_api!(IndexMap<K, V>);

  fn keyed(key: K, provider: Provider<V>) -> Collector<IndexMap<K, V>> {
    let entry_key = key.clone();
    Collector::ItemFrom {
      key: Some(key),
      provider: provider.map(move |value| (entry_key.clone(), value)),
    }
  }

  pub fn put(&self, key: K, value: V) -> Result<&Self, ProviderError> {
    self.core.add_collector(Collector::Item((key, value)))?;
    Ok(self)
  }

  /// Adds an entry whose value is read from `provider`. If it has no value, neither does this property.
  pub fn put_provider(&self, key: K, provider: Provider<V>) -> Result<&Self, ProviderError> {
    self.core.add_collector(Self::keyed(key, provider))?;
    Ok(self)
  }

  pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<&Self, ProviderError> {
    self.core.add_collector(Collector::Fixed {
      value: entries.into_iter().collect(),
      side_effect: None,
    })?;
    Ok(self)
  }

  pub fn put_all_provider(&self, provider: Provider<IndexMap<K, V>>) -> Result<&Self, ProviderError> {
    self.core.add_collector(Collector::ItemsFrom(provider))?;
    Ok(self)
  }

  /// Adds an entry to the value, or to the convention if no value was set.
  pub fn insert(&self, key: K, value: V) -> Result<&Self, ProviderError> {
    self.core.append_collector(Collector::Item((key, value)))?;
    Ok(self)
  }

  /// Like [`insert`](Self::insert); a missing provider contributes nothing.
  pub fn insert_provider(&self, key: K, provider: Provider<V>) -> Result<&Self, ProviderError> {
    self.core.append_collector(Self::keyed(key, provider))?;
    Ok(self)
  }

  pub fn insert_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<&Self, ProviderError> {
    self.core.append_collector(Collector::Fixed {
      value: entries.into_iter().collect(),
      side_effect: None,
    })?;
    Ok(self)
  }

  pub fn insert_all_provider(&self, provider: Provider<IndexMap<K, V>>) -> Result<&Self, ProviderError> {
    self.core.append_collector(Collector::ItemsFrom(provider))?;
    Ok(self)
  }

  pub fn set(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<(), ProviderError> {
    self.core.set_items(entries.into_iter().collect())
  }

  /// Clears the value. Later entries start from "no value" rather than an empty map.
  pub fn set_none(&self) -> Result<(), ProviderError> {
    self.core.unset_value_and_default()
  }

  pub fn value(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<&Self, ProviderError> {
    self.set(entries)?;
    Ok(self)
  }

  pub fn empty(&self) -> Result<&Self, ProviderError> {
    self.core.set_empty()?;
    Ok(self)
  }

  pub fn convention(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<&Self, ProviderError> {
    self.core.convention_items(entries.into_iter().collect())?;
    Ok(self)
  }

  /// Number of entries in the value. Fails if there is no value.
  pub fn size(&self) -> Result<usize, ProviderError> {
    present_size(&self.provider)
  }

  /// The value for `key`; missing if the map has no value or no such entry.
  pub fn getting(&self, key: K) -> Provider<V> {
    self.provider.filter_map(move |map| map.get(&key).cloned())
  }

  /// The keys of the map. Entries whose value comes from a provider are only checked for presence.
  pub fn key_set(&self) -> Provider<IndexSet<K>> {
    Provider::new(KeySetProvider {
      core: self.core.clone(),
      map: self.provider.clone(),
    })
  }
}

impl<K: Data + Hash + Eq, V: Data> std::fmt::Debug for MapProperty<K, V> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "MapProperty({})", self.provider)
  }
}

struct KeySetProvider<K: Data + Hash + Eq, V: Data> {
  core: Arc<CollectionCore<IndexMap<K, V>>>,
  map: Provider<IndexMap<K, V>>,
}

impl<K: Data + Hash + Eq, V: Data> Clone for KeySetProvider<K, V> {
  fn clone(&self) -> Self {
    Self {
      core: self.core.clone(),
      map: self.map.clone(),
    }
  }
}

impl<K: Data + Hash + Eq, V: Data> EvaluationOwner for KeySetProvider<K, V> {
  fn describe(&self) -> String {
    format!("key_set({})", self.map)
  }
}

impl<K: Data + Hash + Eq, V: Data> ProviderInternal<IndexSet<K>> for KeySetProvider<K, V> {
  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<IndexSet<K>>, ProviderError> {
    let supplier = self.core.before_read(consumer)?;
    let keys = self.core.wrap(supplier.calculate_keys(consumer))?;
    Ok(keys.push_when_missing(self.core.display_name().as_ref()))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<IndexSet<K>>, ProviderError> {
    if self.map.calculate_execution_time_value()?.is_changing_value() {
      return Ok(ExecutionTimeValue::changing(Provider::new(self.clone())));
    }
    Ok(ExecutionTimeValue::from_value(
      self.calculate_value(ValueConsumer::IgnoreUnsafeRead)?,
    ))
  }

  fn producer(&self) -> ValueProducer {
    self.map.producer()
  }
}
