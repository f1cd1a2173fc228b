//! List and set properties, plus the mutations every collection property shares.

use std::sync::Arc;

use indexmap::IndexSet;

use super::Accumulator;
use super::collector::{Collector, Exclusion, ExclusionFilter};
use super::supplier::CollectionSupplier;
use crate::error::ProviderError;
use crate::property::{DetachedHost, PropertyCore, PropertyHost, Supplier, property_api};
use crate::provider::{Provider, ValueConsumer};
use crate::value::DisplayName;

pub(crate) type CollectionCore<A> = PropertyCore<A, CollectionSupplier<A>>;

/// Mutations shared by list, set and map properties.
impl<A: Accumulator> PropertyCore<A, CollectionSupplier<A>> {
  pub(crate) fn new_collection(host: Arc<dyn PropertyHost>) -> Self {
    PropertyCore::new(host, A::KIND, CollectionSupplier::Empty, CollectionSupplier::no_value())
  }

  /// Adds to the explicit value. A missing input makes the whole value missing.
  pub(crate) fn add_collector(&self, collector: Collector<A>) -> Result<(), ProviderError> {
    self.update_explicit(|current| current.plus(collector, false))
  }

  /// Adds to the actual value, adopting the convention first. A missing input is ignored.
  pub(crate) fn append_collector(&self, collector: Collector<A>) -> Result<(), ProviderError> {
    self.update_actual(|current| current.plus(collector, true))
  }

  pub(crate) fn set_items(&self, items: A) -> Result<(), ProviderError> {
    self.set_supplier(CollectionSupplier::collecting(Collector::Fixed {
      value: items,
      side_effect: None,
    }))
  }

  pub(crate) fn set_empty(&self) -> Result<(), ProviderError> {
    self.set_supplier(CollectionSupplier::Empty)
  }

  pub(crate) fn convention_items(&self, items: A) -> Result<(), ProviderError> {
    self.set_convention(CollectionSupplier::collecting(Collector::Fixed {
      value: items,
      side_effect: None,
    }))
  }

  fn exclude_with(&self, filter: ExclusionFilter<A::Item>) -> Result<(), ProviderError> {
    self.update_explicit(|current| {
      let exclusion = Exclusion::new(current, filter);
      Ok(CollectionSupplier::collecting(Collector::Excluding(Arc::new(exclusion))))
    })
  }
}

/// Number of items in the present value of `provider`. Fails if there is no value.
pub(crate) fn present_size<A: Accumulator>(provider: &Provider<A>) -> Result<usize, ProviderError> {
  let value = provider.calculate_present_value(ValueConsumer::IgnoreUnsafeRead)?;
  Ok(value.get_without_side_effect().map_or(0, Accumulator::size))
}

fn items_of<A: Accumulator>(value: &A) -> Vec<A::Item> {
  let mut items = Vec::with_capacity(value.size());
  value.for_each_item(&mut |item| items.push(item.clone()));
  items
}

/// A property whose value is a collection built up from individual additions.
///
/// A new collection property holds an empty collection and has no convention.
/// Use [`ListProperty`] and [`SetProperty`] for the common container types.
pub struct CollectionProperty<A: Accumulator> {
  core: Arc<CollectionCore<A>>,
  provider: Provider<A>,
}

/// A property holding an ordered list.
pub type ListProperty<T> = CollectionProperty<Vec<T>>;

/// A property holding an insertion-ordered set.
pub type SetProperty<T> = CollectionProperty<IndexSet<T>>;

impl<A: Accumulator> Clone for CollectionProperty<A> {
  fn clone(&self) -> Self {
    Self {
      core: self.core.clone(),
      provider: self.provider.clone(),
    }
  }
}

impl<A: Accumulator> Default for CollectionProperty<A> {
  fn default() -> Self {
    Self::new()
  }
}

impl<A: Accumulator> CollectionProperty<A> {
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

  property_api!(A);

  pub fn add(&self, item: A::Item) -> Result<&Self, ProviderError> {
    self.core.add_collector(Collector::Item(item))?;
    Ok(self)
  }

  /// Adds the value of `provider`. If it has no value, neither does this property.
  pub fn add_provider(&self, provider: Provider<A::Item>) -> Result<&Self, ProviderError> {
    self.core.add_collector(Collector::ItemFrom { key: None, provider })?;
    Ok(self)
  }

  pub fn add_all(&self, items: impl IntoIterator<Item = A::Item>) -> Result<&Self, ProviderError> {
    self.core.add_collector(Collector::Fixed {
      value: A::from_items(items),
      side_effect: None,
    })?;
    Ok(self)
  }

  pub fn add_all_provider(&self, provider: Provider<A>) -> Result<&Self, ProviderError> {
    self.core.add_collector(Collector::ItemsFrom(provider))?;
    Ok(self)
  }

  /// Adds to the value, or to the convention if no value was set.
  pub fn append(&self, item: A::Item) -> Result<&Self, ProviderError> {
    self.core.append_collector(Collector::Item(item))?;
    Ok(self)
  }

  /// Like [`append`](Self::append); a missing provider contributes nothing.
  pub fn append_provider(&self, provider: Provider<A::Item>) -> Result<&Self, ProviderError> {
    self.core.append_collector(Collector::ItemFrom { key: None, provider })?;
    Ok(self)
  }

  pub fn append_all(&self, items: impl IntoIterator<Item = A::Item>) -> Result<&Self, ProviderError> {
    self.core.append_collector(Collector::Fixed {
      value: A::from_items(items),
      side_effect: None,
    })?;
    Ok(self)
  }

  pub fn append_all_provider(&self, provider: Provider<A>) -> Result<&Self, ProviderError> {
    self.core.append_collector(Collector::ItemsFrom(provider))?;
    Ok(self)
  }

  /// Replaces the value with `items`.
  pub fn set(&self, items: impl IntoIterator<Item = A::Item>) -> Result<(), ProviderError> {
    self.core.set_items(A::from_items(items))
  }

  /// Clears the value. Later additions start from "no value" rather than an empty collection.
  pub fn set_none(&self) -> Result<(), ProviderError> {
    self.core.unset_value_and_default()
  }

  pub fn value(&self, items: impl IntoIterator<Item = A::Item>) -> Result<&Self, ProviderError> {
    self.set(items)?;
    Ok(self)
  }

  /// Sets the value to an empty collection, discarding earlier additions.
  pub fn empty(&self) -> Result<&Self, ProviderError> {
    self.core.set_empty()?;
    Ok(self)
  }

  pub fn convention(&self, items: impl IntoIterator<Item = A::Item>) -> Result<&Self, ProviderError> {
    self.core.convention_items(A::from_items(items))?;
    Ok(self)
  }

  /// Number of items in the value. Fails if there is no value.
  pub fn size(&self) -> Result<usize, ProviderError> {
    present_size(&self.provider)
  }

  /// Removes items matching `predicate` from what has been added so far.
  pub fn exclude_if(&self, predicate: impl Fn(&A::Item) -> bool + Send + Sync + 'static) -> Result<&Self, ProviderError> {
    self.core.exclude_with(ExclusionFilter::Predicate(Arc::new(predicate)))?;
    Ok(self)
  }
}

impl<A: Accumulator> CollectionProperty<A>
where
  A::Item: PartialEq,
{
  /// Removes every item equal to `item` from what has been added so far.
  pub fn exclude(&self, item: A::Item) -> Result<&Self, ProviderError> {
    self.exclude_all_values(Provider::of(vec![item]))
  }

  /// Like [`exclude`](Self::exclude), with the item taken from `provider` when read.
  pub fn exclude_provider(&self, provider: Provider<A::Item>) -> Result<&Self, ProviderError> {
    self.exclude_all_values(provider.map(|item| vec![item]))
  }

  pub fn exclude_all(&self, items: impl IntoIterator<Item = A::Item>) -> Result<&Self, ProviderError> {
    self.exclude_all_values(Provider::of(items.into_iter().collect()))
  }

  pub fn exclude_all_provider(&self, provider: Provider<A>) -> Result<&Self, ProviderError> {
    self.exclude_all_values(provider.map(|value| items_of(&value)))
  }

  fn exclude_all_values(&self, values: Provider<Vec<A::Item>>) -> Result<&Self, ProviderError> {
    self.core.exclude_with(ExclusionFilter::Values(values, <A::Item as PartialEq>::eq))?;
    Ok(self)
  }
}

impl<A: Accumulator> std::fmt::Debug for CollectionProperty<A> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "CollectionProperty({})", self.provider)
  }
}
