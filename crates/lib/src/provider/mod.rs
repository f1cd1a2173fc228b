//! Read-only lazy values and their combinators.
//!
//! A [`Provider`] is a cheap handle to a node in a provider graph. Nodes
//! implement [`ProviderInternal`]; the handle wraps every calculation in an
//! evaluation scope so that re-entering a node on the same thread is reported
//! as a cycle instead of recursing forever.

mod combine;
mod fixed;
mod memoize;
mod transform;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::eval::{self, EvaluationOwner};
use crate::producer::{TaskRef, ValueProducer};
use crate::value::{Data, DisplayName, ExecutionTimeValue, Missing, SideEffect, Value};

use combine::{MergeProvider, OrElseProvider, SideEffectProvider, ZipProvider};
use fixed::{CallableProvider, ChangingContentProvider, FixedProvider, MissingProvider};
use memoize::MemoizedProvider;
use transform::{FilterProvider, FlatMapProvider, MapProvider, Transformer};

/// How strictly a read must respect the readiness of upstream work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueConsumer {
  /// The caller requires upstream work to be ready and the value to be final.
  DisallowUnsafeRead,

  /// The caller accepts whatever the value is right now.
  IgnoreUnsafeRead,
}

/// A node in a provider graph.
///
/// Implementations compute their answers directly; [`Provider`] takes care of
/// entering an evaluation scope around each call.
pub trait ProviderInternal<T: Data>: EvaluationOwner {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    Ok(self.calculate_value(consumer)?.is_present())
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError>;

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    Ok(ExecutionTimeValue::from_value(
      self.calculate_value(ValueConsumer::IgnoreUnsafeRead)?,
    ))
  }

  fn producer(&self) -> ValueProducer {
    ValueProducer::Unknown
  }

  fn display_name(&self) -> Option<DisplayName> {
    None
  }

  /// How errors refer to this node.
  fn subject(&self) -> String {
    "this provider".to_string()
  }
}

/// A handle to a lazily evaluated value.
pub struct Provider<T: Data> {
  inner: Arc<dyn ProviderInternal<T>>,
}

impl<T: Data> Clone for Provider<T> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<T: Data> Provider<T> {
  pub fn new(node: impl ProviderInternal<T> + 'static) -> Self {
    Self { inner: Arc::new(node) }
  }

  pub fn from_arc(inner: Arc<dyn ProviderInternal<T>>) -> Self {
    Self { inner }
  }

  /// A provider with a fixed value.
  pub fn of(value: T) -> Self {
    Self::fixed(value, None)
  }

  pub fn of_option(value: Option<T>) -> Self {
    match value {
      Some(value) => Self::of(value),
      None => Self::missing(),
    }
  }

  pub(crate) fn fixed(value: T, side_effect: Option<SideEffect<T>>) -> Self {
    Self::new(FixedProvider::new(value, side_effect))
  }

  /// A provider with no value.
  pub fn missing() -> Self {
    Self::missing_with(Missing::new())
  }

  pub(crate) fn missing_with(missing: Missing) -> Self {
    Self::new(MissingProvider::new(missing))
  }

  /// Resolves a calculated value into a provider that always returns it.
  pub(crate) fn resolved(value: Value<T>) -> Self {
    match value.into_parts() {
      Ok((value, side_effect)) => Self::fixed(value, side_effect),
      Err(missing) => Self::missing_with(missing),
    }
  }

  /// A provider whose value is computed by `f` on every read.
  ///
  /// Its execution time value is always changing.
  pub fn from_fn(f: impl Fn() -> Option<T> + Send + Sync + 'static) -> Self {
    Self::try_from_fn(move || Ok(f()))
  }

  /// Fallible form of [`Provider::from_fn`].
  pub fn try_from_fn(f: impl Fn() -> Result<Option<T>, ProviderError> + Send + Sync + 'static) -> Self {
    Self::new(CallableProvider::new(Arc::new(f)))
  }

  /// A provider with a fixed value whose content may still change.
  pub fn with_changing_content(value: T) -> Self {
    Self::new(ChangingContentProvider::new(value, ValueProducer::Unknown))
  }

  /// A provider with a fixed value whose content is produced by `task`.
  pub fn produced_by(value: T, task: TaskRef) -> Self {
    Self::new(ChangingContentProvider::new(value, ValueProducer::content(task)))
  }

  /// Combines providers into a provider of all their values, in order.
  pub fn merge(providers: impl IntoIterator<Item = Provider<T>>) -> Provider<Vec<T>> {
    Provider::new(MergeProvider::new(providers.into_iter().collect()))
  }

  fn owner(&self) -> Arc<dyn EvaluationOwner> {
    self.inner.clone()
  }

  pub fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    eval::evaluate(self.owner(), || self.inner.calculate_presence(consumer))
  }

  pub fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    eval::evaluate(self.owner(), || self.inner.calculate_value(consumer))
  }

  pub fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    eval::evaluate(self.owner(), || self.inner.calculate_execution_time_value())
  }

  pub fn producer(&self) -> ValueProducer {
    self.inner.producer()
  }

  pub fn display_name(&self) -> Option<DisplayName> {
    self.inner.display_name()
  }

  /// Returns the value, running its side effect, or fails if there is none.
  pub fn get(&self) -> Result<T, ProviderError> {
    self
      .calculate_value(ValueConsumer::IgnoreUnsafeRead)?
      .into_result()
      .map_err(|missing| self.missing_value(missing))
  }

  /// Returns the value, running its side effect, or `None` if there is none.
  pub fn get_or_none(&self) -> Result<Option<T>, ProviderError> {
    Ok(self.calculate_value(ValueConsumer::IgnoreUnsafeRead)?.get())
  }

  pub fn get_or_else(&self, default: T) -> Result<T, ProviderError> {
    Ok(self.calculate_value(ValueConsumer::IgnoreUnsafeRead)?.or_else(default))
  }

  pub fn is_present(&self) -> Result<bool, ProviderError> {
    self.calculate_presence(ValueConsumer::IgnoreUnsafeRead)
  }

  /// Calculates the value without running its side effect. Fails if there is none.
  pub(crate) fn calculate_present_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    match self.calculate_value(consumer)? {
      Value::Missing(missing) => Err(self.missing_value(missing)),
      present => Ok(present),
    }
  }

  fn missing_value(&self, missing: Missing) -> ProviderError {
    let mut path = missing.into_path();
    if let Some(name) = self.inner.display_name()
      && path.first() == Some(&name)
    {
      path.remove(0);
    }
    ProviderError::MissingValue {
      subject: eval::nested(|| self.inner.subject()),
      path,
    }
  }

  /// Transforms the value.
  pub fn map<R: Data>(&self, f: impl Fn(T) -> R + Send + Sync + 'static) -> Provider<R> {
    self.transform("map", Arc::new(move |value| Ok(Some(f(value)))))
  }

  /// Transforms the value; `None` makes the result missing.
  pub fn filter_map<R: Data>(&self, f: impl Fn(T) -> Option<R> + Send + Sync + 'static) -> Provider<R> {
    self.transform("filter_map", Arc::new(move |value| Ok(f(value))))
  }

  /// Transforms the value with a transformer that may fail.
  pub fn try_map<R: Data>(&self, f: impl Fn(T) -> Result<R, ProviderError> + Send + Sync + 'static) -> Provider<R> {
    self.transform("map", Arc::new(move |value| f(value).map(Some)))
  }

  fn transform<R: Data>(&self, label: &'static str, transformer: Transformer<T, R>) -> Provider<R> {
    Provider::new(MapProvider::new(label, self.clone(), transformer))
  }

  /// Transforms the value into another provider and continues with that provider.
  pub fn flat_map<R: Data>(&self, f: impl Fn(T) -> Provider<R> + Send + Sync + 'static) -> Provider<R> {
    Provider::new(FlatMapProvider::new(self.clone(), Arc::new(move |value| Ok(f(value)))))
  }

  /// Keeps the value only when `predicate` accepts it.
  pub fn filter(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Provider<T> {
    Provider::new(FilterProvider::new(self.clone(), Arc::new(predicate)))
  }

  /// Falls back to `value` when this provider has none.
  pub fn or_else(&self, value: T) -> Provider<T> {
    self.or_else_provider(Provider::of(value))
  }

  /// Falls back to `other` when this provider has no value.
  pub fn or_else_provider(&self, other: Provider<T>) -> Provider<T> {
    Provider::new(OrElseProvider::new(self.clone(), other))
  }

  /// Combines this value with another provider's value.
  pub fn zip<U: Data, R: Data>(
    &self,
    other: Provider<U>,
    combiner: impl Fn(T, U) -> R + Send + Sync + 'static,
  ) -> Provider<R> {
    Provider::new(ZipProvider::new(self.clone(), other, Arc::new(combiner)))
  }

  /// Attaches a side effect that runs whenever the value is consumed.
  pub fn with_side_effect(&self, side_effect: SideEffect<T>) -> Provider<T> {
    Provider::new(SideEffectProvider::new(self.clone(), side_effect))
  }

  /// Caches the first calculated value.
  pub fn memoize(&self) -> Provider<T> {
    Provider::new(MemoizedProvider::new(self.clone()))
  }

  /// Whether both handles point at the same node.
  pub fn same_node(&self, other: &Provider<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
  }
}

impl<T: Data> fmt::Display for Provider<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.inner.describe())
  }
}

impl<T: Data> fmt::Debug for Provider<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Provider({})", self.inner.describe())
  }
}
