//! The value of a collection property and the folds that resolve it.
//!
//! A collecting supplier is a chain of collectors, each either a normal
//! increment (`add`, `put`) or an absent-ignoring one (`append`, `insert`).
//! A missing normal increment poisons the value and discards everything
//! gathered before it; a later absent-ignoring increment recovers it. The
//! three folds below agree on that rule:
//!
//! - presence walks newest to oldest and stops at the first poison or recovery;
//! - the value walks oldest to newest, skipping normal increments while poisoned;
//! - the execution time value walks newest to oldest, holding normal increments
//!   as candidates until an absent-ignoring increment makes them certain.

use std::hash::Hash;

use indexmap::IndexSet;

use super::Accumulator;
use super::chain::CollectorChain;
use super::collector::{ChainEntry, Collector};
use crate::error::ProviderError;
use crate::eval::EvaluationOwner;
use crate::producer::ValueProducer;
use crate::property::Supplier;
use crate::provider::{Provider, ProviderInternal, ValueConsumer};
use crate::value::{ExecutionTimeValue, Missing, SideEffect, SideEffectBuilder, Value};

/// The current value of a collection property.
pub(crate) enum CollectionSupplier<A: Accumulator> {
  /// No value. Adding to it keeps it missing; appending starts a new chain.
  NoValue(Missing),

  /// An empty collection.
  Empty,

  /// A resolved collection.
  Fixed {
    value: A,
    side_effect: Option<SideEffect<A>>,
  },

  Collecting(CollectorChain<A>),
}

impl<A: Accumulator> Clone for CollectionSupplier<A> {
  fn clone(&self) -> Self {
    match self {
      CollectionSupplier::NoValue(missing) => CollectionSupplier::NoValue(missing.clone()),
      CollectionSupplier::Empty => CollectionSupplier::Empty,
      CollectionSupplier::Fixed { value, side_effect } => CollectionSupplier::Fixed {
        value: value.clone(),
        side_effect: side_effect.clone(),
      },
      CollectionSupplier::Collecting(chain) => CollectionSupplier::Collecting(chain.clone()),
    }
  }
}

impl<A: Accumulator> CollectionSupplier<A> {
  #[cfg(test)]
  pub(crate) fn fixed(value: A) -> Self {
    CollectionSupplier::Fixed {
      value,
      side_effect: None,
    }
  }

  /// A supplier holding a single collector.
  pub(crate) fn collecting(collector: Collector<A>) -> Self {
    CollectionSupplier::Collecting(CollectorChain::single(ChainEntry::new(collector, false)))
  }

  /// Returns this value with `collector` added.
  pub(crate) fn plus(&self, collector: Collector<A>, ignore_absent: bool) -> Result<Self, ProviderError> {
    let entry = ChainEntry::new(collector, ignore_absent);
    match self {
      CollectionSupplier::NoValue(_) if !ignore_absent => Ok(self.clone()),
      CollectionSupplier::NoValue(_) | CollectionSupplier::Empty => {
        Ok(CollectionSupplier::Collecting(CollectorChain::single(entry)))
      }
      CollectionSupplier::Fixed { value, side_effect } => {
        let base = CollectorChain::single(ChainEntry::new(
          Collector::Fixed {
            value: value.clone(),
            side_effect: side_effect.clone(),
          },
          false,
        ));
        Ok(CollectionSupplier::Collecting(base.plus(entry)?))
      }
      CollectionSupplier::Collecting(chain) => Ok(CollectionSupplier::Collecting(chain.plus(entry)?)),
    }
  }
}

impl<A: Accumulator> CollectionSupplier<A>
where
  A::Key: Hash + Eq,
{
  /// The keys of the value, evaluating keyed entries only for presence.
  pub(crate) fn calculate_keys(&self, consumer: ValueConsumer) -> Result<Value<IndexSet<A::Key>>, ProviderError> {
    match self {
      CollectionSupplier::NoValue(missing) => Ok(Value::Missing(missing.clone())),
      CollectionSupplier::Empty => Ok(Value::of(IndexSet::new())),
      CollectionSupplier::Fixed { value, .. } => {
        let mut keys = IndexSet::new();
        value.for_each_item(&mut |item| {
          keys.insert(A::key_of(item));
        });
        Ok(Value::of(keys))
      }
      CollectionSupplier::Collecting(chain) => chain.calculate_keys(consumer),
    }
  }
}

impl<A: Accumulator> Supplier<A> for CollectionSupplier<A> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    match self {
      CollectionSupplier::NoValue(_) => Ok(false),
      CollectionSupplier::Empty | CollectionSupplier::Fixed { .. } => Ok(true),
      CollectionSupplier::Collecting(chain) => chain.calculate_presence(consumer),
    }
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<A>, ProviderError> {
    match self {
      CollectionSupplier::NoValue(missing) => Ok(Value::Missing(missing.clone())),
      CollectionSupplier::Empty => Ok(Value::of(A::default())),
      CollectionSupplier::Fixed { value, side_effect } => Ok(Value::Present {
        value: value.clone(),
        side_effect: side_effect.clone(),
      }),
      CollectionSupplier::Collecting(chain) => chain.calculate_value(consumer),
    }
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<A>, ProviderError> {
    match self {
      CollectionSupplier::NoValue(_) => Ok(ExecutionTimeValue::missing()),
      CollectionSupplier::Empty => Ok(ExecutionTimeValue::fixed(A::default())),
      CollectionSupplier::Fixed { value, side_effect } => {
        Ok(ExecutionTimeValue::fixed(value.clone()).with_side_effect(side_effect.clone()))
      }
      CollectionSupplier::Collecting(chain) => chain.calculate_execution_time_value(),
    }
  }

  fn producer(&self) -> ValueProducer {
    match self {
      CollectionSupplier::NoValue(_) | CollectionSupplier::Fixed { .. } => ValueProducer::Unknown,
      CollectionSupplier::Empty => ValueProducer::NoProducer,
      CollectionSupplier::Collecting(chain) => chain.producer(),
    }
  }

  fn resolved(value: Value<A>) -> Self {
    match value.into_parts() {
      Ok((value, side_effect)) => CollectionSupplier::Fixed { value, side_effect },
      Err(missing) => CollectionSupplier::NoValue(missing),
    }
  }

  fn from_execution_time_value(value: ExecutionTimeValue<A>) -> Self {
    match value {
      ExecutionTimeValue::Missing => CollectionSupplier::no_value(),
      ExecutionTimeValue::Fixed {
        value,
        changing_content: false,
        side_effect,
      } => CollectionSupplier::Fixed { value, side_effect },
      changing => CollectionSupplier::collecting(Collector::ItemsFrom(changing.to_provider())),
    }
  }

  fn from_provider(provider: Provider<A>) -> Self {
    CollectionSupplier::collecting(Collector::ItemsFrom(provider))
  }

  fn to_provider(&self) -> Provider<A> {
    match self {
      CollectionSupplier::NoValue(missing) => Provider::missing_with(missing.clone()),
      CollectionSupplier::Empty => Provider::of(A::default()),
      CollectionSupplier::Fixed { value, side_effect } => Provider::fixed(value.clone(), side_effect.clone()),
      CollectionSupplier::Collecting(chain) => Provider::new(ChainProvider { chain: chain.clone() }),
    }
  }

  fn no_value() -> Self {
    CollectionSupplier::NoValue(Missing::new())
  }

  fn branch(&self) -> Self {
    match self {
      CollectionSupplier::Collecting(chain) => CollectionSupplier::Collecting(chain.branch()),
      other => other.clone(),
    }
  }

  fn describe(&self) -> String {
    match self {
      CollectionSupplier::NoValue(missing) => missing.to_string(),
      CollectionSupplier::Empty => "[]".to_string(),
      CollectionSupplier::Fixed { value, .. } => format!("{value:?}"),
      CollectionSupplier::Collecting(chain) => chain.describe(),
    }
  }
}

/// Turns a non-missing execution time value back into a collector.
fn to_collector<A: Accumulator>(value: ExecutionTimeValue<A>) -> Collector<A> {
  match value {
    ExecutionTimeValue::Fixed {
      value,
      changing_content: false,
      side_effect: None,
    } => Collector::Fixed {
      value,
      side_effect: None,
    },
    other => Collector::ItemsFrom(other.to_provider()),
  }
}

impl<A: Accumulator> CollectorChain<A> {
  pub(crate) fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    for entry in self.entries().into_iter().rev() {
      if !entry.calculate_presence(consumer)? {
        return Ok(false);
      }
      if entry.ignore_absent {
        return Ok(true);
      }
    }
    Ok(true)
  }

  pub(crate) fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<A>, ProviderError> {
    let mut dest = A::default();
    let mut composite = Value::present();
    for entry in self.entries() {
      if composite.is_missing() && !entry.ignore_absent {
        continue;
      }
      let result = entry.collect_entries(consumer, &mut dest)?;
      if result.is_missing() {
        dest = A::default();
        composite = result;
      } else if composite.is_missing() {
        composite = result;
      } else {
        composite = composite.with_side_effect(result.side_effect().cloned());
      }
    }
    match composite.into_parts() {
      Err(missing) => Ok(Value::Missing(missing)),
      Ok(((), side_effect)) => Ok(Value::Present {
        value: dest,
        side_effect: side_effect.map(|effect| SideEffect::fixed((), effect)),
      }),
    }
  }

  /// The entries that can still contribute, oldest first, with their execution time values.
  ///
  /// Empty when the whole value is missing.
  fn collect_execution_time_values(&self) -> Result<Vec<(&ChainEntry<A>, ExecutionTimeValue<A>)>, ProviderError> {
    let mut certain = Vec::new();
    let mut candidates = Vec::new();
    for entry in self.entries().into_iter().rev() {
      let value = entry.calculate_execution_time_value()?;
      if value.is_missing() {
        certain.reverse();
        return Ok(certain);
      }
      if entry.ignore_absent {
        certain.append(&mut candidates);
        certain.push((entry, value));
      } else {
        candidates.push((entry, value));
      }
    }
    certain.append(&mut candidates);
    certain.reverse();
    Ok(certain)
  }

  pub(crate) fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<A>, ProviderError> {
    let values = self.collect_execution_time_values()?;
    if values.is_empty() {
      return Ok(ExecutionTimeValue::missing());
    }

    if values.iter().all(|(_, value)| !value.is_changing_value()) {
      let changing_content = values.iter().any(|(_, value)| value.has_changing_content());
      let mut merged = A::default();
      let mut side_effects = SideEffectBuilder::new();
      for (_, value) in &values {
        if let Some(fixed) = value.fixed_value() {
          merged.extend_from(fixed);
        }
        side_effects.add(SideEffect::fixed_from_execution_time(value));
      }
      let merged = ExecutionTimeValue::fixed(merged);
      let merged = if changing_content {
        merged.with_changing_content()
      } else {
        merged
      };
      return Ok(merged.with_side_effect(side_effects.build()));
    }

    // Rebuild a smaller chain from what is left and evaluate it at execution time.
    let entries = values
      .into_iter()
      .map(|(entry, value)| ChainEntry::new(to_collector(value), entry.ignore_absent));
    match CollectorChain::from_entries(entries) {
      Some(chain) => Ok(ExecutionTimeValue::changing(Provider::new(ChainProvider { chain }))),
      None => Ok(ExecutionTimeValue::missing()),
    }
  }

  pub(crate) fn producer(&self) -> ValueProducer {
    self.entries().iter().map(|entry| entry.collector.producer()).collect()
  }
}

impl<A: Accumulator> CollectorChain<A>
where
  A::Key: Hash + Eq,
{
  /// Same fold as [`calculate_value`](Self::calculate_value), collecting keys only.
  pub(crate) fn calculate_keys(&self, consumer: ValueConsumer) -> Result<Value<IndexSet<A::Key>>, ProviderError> {
    let mut keys = IndexSet::new();
    let mut composite = Value::present();
    for entry in self.entries() {
      if composite.is_missing() && !entry.ignore_absent {
        continue;
      }
      let result = entry.collect_keys(consumer, &mut keys)?;
      if result.is_missing() {
        keys.clear();
        composite = result;
      } else if composite.is_missing() {
        composite = Value::present();
      }
    }
    match composite {
      Value::Missing(missing) => Ok(Value::Missing(missing)),
      Value::Present { .. } => Ok(Value::of(keys)),
    }
  }
}

/// A collector chain read as a provider.
pub(crate) struct ChainProvider<A: Accumulator> {
  chain: CollectorChain<A>,
}

impl<A: Accumulator> EvaluationOwner for ChainProvider<A> {
  fn describe(&self) -> String {
    format!("{}({})", A::KIND, self.chain.describe())
  }
}

impl<A: Accumulator> ProviderInternal<A> for ChainProvider<A> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    self.chain.calculate_presence(consumer)
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<A>, ProviderError> {
    self.chain.calculate_value(consumer)
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<A>, ProviderError> {
    self.chain.calculate_execution_time_value()
  }

  fn producer(&self) -> ValueProducer {
    self.chain.producer()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  type List = CollectionSupplier<Vec<i32>>;

  fn add(supplier: List, value: i32) -> List {
    supplier.plus(Collector::Item(value), false).unwrap()
  }

  fn add_missing(supplier: List) -> List {
    supplier.plus(Collector::ItemsFrom(Provider::missing()), false).unwrap()
  }

  fn append(supplier: List, value: i32) -> List {
    supplier
      .plus(Collector::ItemFrom { key: None, provider: Provider::of(value) }, true)
      .unwrap()
  }

  fn value_of(supplier: &List) -> Option<Vec<i32>> {
    supplier.calculate_value(ValueConsumer::IgnoreUnsafeRead).unwrap().get()
  }

  fn present(supplier: &List) -> bool {
    supplier.calculate_presence(ValueConsumer::IgnoreUnsafeRead).unwrap()
  }

  // ==========================================================================
  // Supplier states
  // ==========================================================================

  #[test]
  fn no_value_stays_missing_on_add() {
    let supplier = add(List::no_value(), 1);
    assert!(!present(&supplier));
    assert_eq!(value_of(&supplier), None);
  }

  #[test]
  fn no_value_recovers_on_append() {
    let supplier = append(List::no_value(), 1);
    assert!(present(&supplier));
    assert_eq!(value_of(&supplier), Some(vec![1]));
  }

  #[test]
  fn empty_plus_item() {
    let supplier = add(List::Empty, 1);
    assert_eq!(value_of(&supplier), Some(vec![1]));
  }

  #[test]
  fn fixed_plus_item_keeps_fixed_first() {
    let supplier = add(List::fixed(vec![1, 2]), 3);
    assert_eq!(value_of(&supplier), Some(vec![1, 2, 3]));
  }

  // ==========================================================================
  // Folds
  // ==========================================================================

  #[test]
  fn trailing_append_recovers_presence() {
    let supplier = append(add_missing(List::Empty), 1);
    assert!(present(&supplier));
  }

  #[test]
  fn missing_add_poisons_everything_before_and_after() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let first = Provider::of(1).with_side_effect(SideEffect::new(move |_: &i32| {
      counter.fetch_add(1, Ordering::SeqCst);
    }));
    let supplier = List::Empty
      .plus(Collector::ItemFrom { key: None, provider: first }, false)
      .unwrap();
    let supplier = add(add_missing(supplier), 2);
    assert!(!present(&supplier));
    assert_eq!(value_of(&supplier), None);
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn recovery_keeps_entries_from_append_onwards() {
    let supplier = add(append(add_missing(add(List::Empty, 1)), 2), 3);
    assert_eq!(value_of(&supplier), Some(vec![2, 3]));
  }

  #[test]
  fn execution_time_value_of_fixed_entries_is_fixed() {
    let supplier = add(add(List::Empty, 1), 2);
    let value = supplier.calculate_execution_time_value().unwrap();
    assert_eq!(value.fixed_value(), Some(&vec![1, 2]));
  }

  #[test]
  fn execution_time_value_discards_poisoned_prefix() {
    let supplier = add(append(add_missing(add(List::Empty, 1)), 2), 3);
    let value = supplier.calculate_execution_time_value().unwrap();
    assert_eq!(value.fixed_value(), Some(&vec![2, 3]));
  }

  #[test]
  fn execution_time_value_with_missing_add_is_missing() {
    let supplier = add(add_missing(add(List::Empty, 1)), 2);
    assert!(supplier.calculate_execution_time_value().unwrap().is_missing());
  }

  #[test]
  fn execution_time_value_with_changing_entry_is_changing() {
    let supplier = add(List::Empty, 1)
      .plus(Collector::ItemFrom { key: None, provider: Provider::from_fn(|| Some(2)) }, false)
      .unwrap();
    let value = supplier.calculate_execution_time_value().unwrap();
    assert!(value.is_changing_value());
    assert_eq!(value.to_provider().get().unwrap(), vec![1, 2]);
  }

  #[test]
  fn changing_content_is_propagated() {
    let supplier = add(List::Empty, 1)
      .plus(Collector::ItemsFrom(Provider::with_changing_content(vec![2])), false)
      .unwrap();
    let value = supplier.calculate_execution_time_value().unwrap();
    assert!(value.has_changing_content());
    assert_eq!(value.fixed_value(), Some(&vec![1, 2]));
  }

  #[test]
  fn from_execution_time_value_round_trips_changing() {
    let supplier = List::from_execution_time_value(ExecutionTimeValue::changing(Provider::from_fn(|| Some(vec![5]))));
    assert_eq!(value_of(&supplier), Some(vec![5]));
  }

  #[test]
  fn keys_fold_mirrors_value_fold() {
    type Map = CollectionSupplier<indexmap::IndexMap<&'static str, i32>>;
    let supplier = Map::Empty
      .plus(Collector::Item(("a", 1)), false)
      .unwrap()
      .plus(Collector::ItemsFrom(Provider::missing()), false)
      .unwrap()
      .plus(Collector::Item(("b", 2)), true)
      .unwrap();
    let keys = supplier
      .calculate_keys(ValueConsumer::IgnoreUnsafeRead)
      .unwrap()
      .get()
      .unwrap();
    assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["b"]);
  }
}
