//! Caching provider.

use parking_lot::Mutex;

use super::{Provider, ProviderInternal, ValueConsumer};
use crate::error::ProviderError;
use crate::eval::EvaluationOwner;
use crate::producer::ValueProducer;
use crate::value::{Data, ExecutionTimeValue, Value};

/// Caches the first calculated value, and the first fixed execution time value.
///
/// The upstream is evaluated without holding the cache lock. Two threads
/// racing on an empty cache may both evaluate it; the first result stored wins.
pub(super) struct MemoizedProvider<T: Data> {
  upstream: Provider<T>,
  value: Mutex<Option<Value<T>>>,
  fixed: Mutex<Option<ExecutionTimeValue<T>>>,
}

impl<T: Data> MemoizedProvider<T> {
  pub(super) fn new(upstream: Provider<T>) -> Self {
    Self {
      upstream,
      value: Mutex::new(None),
      fixed: Mutex::new(None),
    }
  }
}

impl<T: Data> EvaluationOwner for MemoizedProvider<T> {
  fn describe(&self) -> String {
    format!("memoize({})", self.upstream)
  }
}

impl<T: Data> ProviderInternal<T> for MemoizedProvider<T> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    if let Some(value) = self.value.lock().as_ref() {
      return Ok(value.is_present());
    }
    self.upstream.calculate_presence(consumer)
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    if let Some(value) = self.value.lock().clone() {
      return Ok(value);
    }
    let value = self.upstream.calculate_value(consumer)?;
    Ok(self.value.lock().get_or_insert(value).clone())
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    if let Some(fixed) = self.fixed.lock().clone() {
      return Ok(fixed);
    }
    let value = self.upstream.calculate_execution_time_value()?;
    if value.has_fixed_value() {
      return Ok(self.fixed.lock().get_or_insert(value).clone());
    }
    Ok(value)
  }

  fn producer(&self) -> ValueProducer {
    self.upstream.producer()
  }
}
