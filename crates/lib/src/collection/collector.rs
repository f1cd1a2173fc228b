//! Collectors: the increments a collection property is folded from.

use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexSet;

use super::Accumulator;
use super::supplier::CollectionSupplier;
use crate::error::ProviderError;
use crate::eval::EvaluationOwner;
use crate::producer::ValueProducer;
use crate::property::Supplier;
use crate::provider::{Provider, ProviderInternal, ValueConsumer};
use crate::value::{Data, ExecutionTimeValue, SideEffect, Value};

/// One increment of a collection property.
#[derive(Clone)]
pub(crate) enum Collector<A: Accumulator> {
  /// A single known item.
  Item(A::Item),

  /// A known collection of items.
  Fixed {
    value: A,
    side_effect: Option<SideEffect<A>>,
  },

  /// A single item from a provider. `key` is set when the key is known without
  /// evaluating the provider, as for map entries.
  ItemFrom {
    key: Option<A::Key>,
    provider: Provider<A::Item>,
  },

  /// Every item of a provided collection.
  ItemsFrom(Provider<A>),

  /// The items of another supplier, minus the excluded ones.
  Excluding(Arc<Exclusion<A>>),
}

pub(crate) type ItemPredicate<I> = Arc<dyn Fn(&I) -> bool + Send + Sync>;

/// Which items an exclusion removes.
pub(crate) enum ExclusionFilter<I: Data> {
  Predicate(ItemPredicate<I>),

  /// Items equal to any of the provided values. A missing provider excludes nothing.
  Values(Provider<Vec<I>>, fn(&I, &I) -> bool),
}

pub(crate) struct Exclusion<A: Accumulator> {
  source: CollectionSupplier<A>,
  filter: ExclusionFilter<A::Item>,
}

fn fixed_unit<A: Accumulator>(value: &A, side_effect: Option<&SideEffect<A>>) -> Value<()> {
  Value::present().with_side_effect(side_effect.map(|effect| SideEffect::fixed(value.clone(), effect.clone())))
}

fn keys_of<A: Accumulator>(value: &A, dest: &mut IndexSet<A::Key>)
where
  A::Key: Hash + Eq,
{
  value.for_each_item(&mut |item| {
    dest.insert(A::key_of(item));
  });
}

impl<A: Accumulator> Collector<A> {
  pub(crate) fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    match self {
      Collector::Item(_) | Collector::Fixed { .. } => Ok(true),
      Collector::ItemFrom { provider, .. } => provider.calculate_presence(consumer),
      Collector::ItemsFrom(provider) => provider.calculate_presence(consumer),
      Collector::Excluding(exclusion) => exclusion.source.calculate_presence(consumer),
    }
  }

  /// Adds this collector's items to `dest`.
  ///
  /// When the result is missing, `dest` may hold a partial contribution and must be discarded.
  pub(crate) fn collect_entries(&self, consumer: ValueConsumer, dest: &mut A) -> Result<Value<()>, ProviderError> {
    match self {
      Collector::Item(item) => {
        dest.insert(item.clone());
        Ok(Value::present())
      }
      Collector::Fixed { value, side_effect } => {
        dest.extend_from(value);
        Ok(fixed_unit(value, side_effect.as_ref()))
      }
      Collector::ItemFrom { provider, .. } => match provider.calculate_value(consumer)?.into_parts() {
        Err(missing) => Ok(Value::Missing(missing)),
        Ok((item, side_effect)) => {
          let fixed = side_effect.map(|effect| SideEffect::fixed(item.clone(), effect));
          dest.insert(item);
          Ok(Value::present().with_side_effect(fixed))
        }
      },
      Collector::ItemsFrom(provider) => match provider.calculate_value(consumer)?.into_parts() {
        Err(missing) => Ok(Value::Missing(missing)),
        Ok((value, side_effect)) => {
          dest.extend_from(&value);
          Ok(fixed_unit(&value, side_effect.as_ref()))
        }
      },
      Collector::Excluding(exclusion) => exclusion.collect_entries(consumer, dest),
    }
  }

  pub(crate) fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<A>, ProviderError> {
    match self {
      Collector::Item(item) => Ok(ExecutionTimeValue::fixed(A::from_items([item.clone()]))),
      Collector::Fixed { value, side_effect } => {
        Ok(ExecutionTimeValue::fixed(value.clone()).with_side_effect(side_effect.clone()))
      }
      Collector::ItemFrom { provider, .. } => Ok(match provider.calculate_execution_time_value()? {
        ExecutionTimeValue::Missing => ExecutionTimeValue::Missing,
        ExecutionTimeValue::Fixed {
          value,
          changing_content,
          side_effect,
        } => ExecutionTimeValue::Fixed {
          value: A::from_items([value.clone()]),
          changing_content,
          side_effect: side_effect.map(|effect| SideEffect::fixed(value, effect)),
        },
        ExecutionTimeValue::Changing(provider) => {
          ExecutionTimeValue::changing(provider.map(|item| A::from_items([item])))
        }
      }),
      Collector::ItemsFrom(provider) => provider.calculate_execution_time_value(),
      Collector::Excluding(exclusion) => exclusion.calculate_execution_time_value(),
    }
  }

  pub(crate) fn producer(&self) -> ValueProducer {
    match self {
      Collector::Item(_) | Collector::Fixed { .. } => ValueProducer::NoProducer,
      Collector::ItemFrom { provider, .. } => provider.producer(),
      Collector::ItemsFrom(provider) => provider.producer(),
      Collector::Excluding(exclusion) => exclusion.producer(),
    }
  }

  pub(crate) fn describe(&self) -> String {
    match self {
      Collector::Item(item) => format!("{item:?}"),
      Collector::Fixed { value, .. } => format!("{value:?}"),
      Collector::ItemFrom { provider, .. } => provider.to_string(),
      Collector::ItemsFrom(provider) => provider.to_string(),
      Collector::Excluding(exclusion) => exclusion.describe(),
    }
  }
}

impl<A: Accumulator> Collector<A>
where
  A::Key: Hash + Eq,
{
  /// Adds the keys this collector contributes to `dest`, evaluating as little as possible.
  pub(crate) fn collect_keys(
    &self,
    consumer: ValueConsumer,
    dest: &mut IndexSet<A::Key>,
  ) -> Result<Value<()>, ProviderError> {
    match self {
      Collector::Item(item) => {
        dest.insert(A::key_of(item));
        Ok(Value::present())
      }
      Collector::Fixed { value, .. } => {
        keys_of(value, dest);
        Ok(Value::present())
      }
      Collector::ItemFrom { key: Some(key), provider } => {
        if provider.calculate_presence(consumer)? {
          dest.insert(key.clone());
          Ok(Value::present())
        } else {
          Ok(Value::missing())
        }
      }
      Collector::ItemFrom { key: None, provider } => match provider.calculate_value(consumer)?.into_parts() {
        Err(missing) => Ok(Value::Missing(missing)),
        Ok((item, _)) => {
          dest.insert(A::key_of(&item));
          Ok(Value::present())
        }
      },
      Collector::ItemsFrom(provider) => match provider.calculate_value(consumer)?.into_parts() {
        Err(missing) => Ok(Value::Missing(missing)),
        Ok((value, _)) => {
          keys_of(&value, dest);
          Ok(Value::present())
        }
      },
      Collector::Excluding(exclusion) => {
        let mut items = A::default();
        let result = exclusion.collect_entries(consumer, &mut items)?;
        if result.is_present() {
          keys_of(&items, dest);
        }
        Ok(result)
      }
    }
  }
}

/// A recorded collector, with whether a missing input should be ignored.
#[derive(Clone)]
pub(crate) struct ChainEntry<A: Accumulator> {
  pub(crate) collector: Collector<A>,
  pub(crate) ignore_absent: bool,
}

impl<A: Accumulator> ChainEntry<A> {
  pub(crate) fn new(collector: Collector<A>, ignore_absent: bool) -> Self {
    Self {
      collector,
      ignore_absent,
    }
  }

  pub(crate) fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    if self.ignore_absent {
      return Ok(true);
    }
    self.collector.calculate_presence(consumer)
  }

  /// Collects into `dest`. An absent-ignoring entry whose input is missing contributes nothing and stays present.
  pub(crate) fn collect_entries(&self, consumer: ValueConsumer, dest: &mut A) -> Result<Value<()>, ProviderError> {
    if !self.ignore_absent {
      return self.collector.collect_entries(consumer, dest);
    }
    let mut candidates = A::default();
    let result = self.collector.collect_entries(consumer, &mut candidates)?;
    if result.is_missing() {
      return Ok(Value::present());
    }
    dest.extend_from(&candidates);
    Ok(result)
  }

  pub(crate) fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<A>, ProviderError> {
    let value = self.collector.calculate_execution_time_value()?;
    if self.ignore_absent && value.is_missing() {
      return Ok(ExecutionTimeValue::fixed(A::default()));
    }
    Ok(value)
  }

  pub(crate) fn describe(&self) -> String {
    if self.ignore_absent {
      format!("absent_ignoring({})", self.collector.describe())
    } else {
      self.collector.describe()
    }
  }
}

impl<A: Accumulator> ChainEntry<A>
where
  A::Key: Hash + Eq,
{
  pub(crate) fn collect_keys(
    &self,
    consumer: ValueConsumer,
    dest: &mut IndexSet<A::Key>,
  ) -> Result<Value<()>, ProviderError> {
    if !self.ignore_absent {
      return self.collector.collect_keys(consumer, dest);
    }
    let mut candidates = IndexSet::new();
    let result = self.collector.collect_keys(consumer, &mut candidates)?;
    if result.is_present() {
      dest.extend(candidates);
    }
    Ok(Value::present())
  }
}

impl<A: Accumulator> Exclusion<A> {
  pub(crate) fn new(source: CollectionSupplier<A>, filter: ExclusionFilter<A::Item>) -> Self {
    Self { source, filter }
  }

  /// The excluded values, or `None` when a predicate decides instead.
  fn excluded(&self, consumer: ValueConsumer) -> Result<Option<Value<Vec<A::Item>>>, ProviderError> {
    match &self.filter {
      ExclusionFilter::Predicate(_) => Ok(None),
      ExclusionFilter::Values(values, _) => values.calculate_value(consumer).map(Some),
    }
  }

  fn apply(&self, value: &mut A, excluded: Option<&[A::Item]>) {
    match (&self.filter, excluded) {
      (ExclusionFilter::Predicate(predicate), _) => value.retain_items(&mut |item| !predicate(item)),
      (ExclusionFilter::Values(_, equals), Some(excluded)) => {
        value.retain_items(&mut |item| !excluded.iter().any(|other| equals(item, other)))
      }
      (ExclusionFilter::Values(..), None) => {}
    }
  }

  fn collect_entries(&self, consumer: ValueConsumer, dest: &mut A) -> Result<Value<()>, ProviderError> {
    let (mut value, side_effect) = match self.source.calculate_value(consumer)?.into_parts() {
      Ok(parts) => parts,
      Err(missing) => return Ok(Value::Missing(missing)),
    };
    let result = fixed_unit(&value, side_effect.as_ref());
    let (excluded, excluded_effect) = match self.excluded(consumer)? {
      Some(Value::Present { value, side_effect }) => {
        let effect = side_effect.map(|effect| SideEffect::fixed(value.clone(), effect));
        (Some(value), effect)
      }
      _ => (None, None),
    };
    self.apply(&mut value, excluded.as_deref());
    dest.extend_from(&value);
    Ok(result.with_side_effect(excluded_effect))
  }

  fn calculate_execution_time_value(self: &Arc<Self>) -> Result<ExecutionTimeValue<A>, ProviderError> {
    let source = self.source.calculate_execution_time_value()?;
    let excluded = match &self.filter {
      ExclusionFilter::Predicate(_) => None,
      ExclusionFilter::Values(values, _) => Some(values.calculate_execution_time_value()?),
    };
    let excluded_is_fixed = excluded
      .as_ref()
      .is_none_or(|value| !value.is_changing_value() && !value.has_changing_content());
    match source {
      ExecutionTimeValue::Missing => Ok(ExecutionTimeValue::Missing),
      ExecutionTimeValue::Fixed {
        value,
        changing_content: false,
        side_effect,
      } if excluded_is_fixed => {
        let mut filtered = value.clone();
        self.apply(&mut filtered, excluded.as_ref().and_then(|value| value.fixed_value()).map(Vec::as_slice));
        let side_effect = side_effect.map(|effect| SideEffect::fixed(value, effect));
        let excluded_effect = excluded.as_ref().and_then(SideEffect::fixed_from_execution_time);
        Ok(ExecutionTimeValue::fixed(filtered).with_side_effect(SideEffect::composite([side_effect, excluded_effect])))
      }
      _ => Ok(ExecutionTimeValue::changing(Provider::new(ExcludingProvider {
        exclusion: self.clone(),
      }))),
    }
  }

  fn producer(&self) -> ValueProducer {
    let source = self.source.producer();
    match &self.filter {
      ExclusionFilter::Predicate(_) => source,
      ExclusionFilter::Values(values, _) => source.plus(values.producer()),
    }
  }

  fn describe(&self) -> String {
    match &self.filter {
      ExclusionFilter::Predicate(_) => format!("excluding({}, <predicate>)", self.source.describe()),
      ExclusionFilter::Values(values, _) => format!("excluding({}, {})", self.source.describe(), values),
    }
  }
}

/// Evaluates an exclusion at execution time.
struct ExcludingProvider<A: Accumulator> {
  exclusion: Arc<Exclusion<A>>,
}

impl<A: Accumulator> EvaluationOwner for ExcludingProvider<A> {
  fn describe(&self) -> String {
    self.exclusion.describe()
  }
}

impl<A: Accumulator> ProviderInternal<A> for ExcludingProvider<A> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    self.exclusion.source.calculate_presence(consumer)
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<A>, ProviderError> {
    let mut dest = A::default();
    match self.exclusion.collect_entries(consumer, &mut dest)?.into_parts() {
      Err(missing) => Ok(Value::Missing(missing)),
      Ok(((), side_effect)) => Ok(Value::Present {
        value: dest,
        side_effect: side_effect.map(|effect| SideEffect::fixed((), effect)),
      }),
    }
  }

  fn producer(&self) -> ValueProducer {
    self.exclusion.producer()
  }
}
