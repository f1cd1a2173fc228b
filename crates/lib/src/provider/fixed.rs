//! Leaf providers: fixed, missing, computed and changing-content values.

use std::sync::Arc;

use super::{Provider, ProviderInternal, ValueConsumer};
use crate::error::ProviderError;
use crate::eval::EvaluationOwner;
use crate::producer::ValueProducer;
use crate::value::{Data, ExecutionTimeValue, Missing, SideEffect, Value};

pub(super) struct FixedProvider<T> {
  value: T,
  side_effect: Option<SideEffect<T>>,
}

impl<T: Data> FixedProvider<T> {
  pub(super) fn new(value: T, side_effect: Option<SideEffect<T>>) -> Self {
    Self { value, side_effect }
  }
}

impl<T: Data> EvaluationOwner for FixedProvider<T> {
  fn describe(&self) -> String {
    format!("fixed({:?})", self.value)
  }
}

impl<T: Data> ProviderInternal<T> for FixedProvider<T> {
  fn calculate_presence(&self, _consumer: ValueConsumer) -> Result<bool, ProviderError> {
    Ok(true)
  }

  fn calculate_value(&self, _consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    Ok(Value::of(self.value.clone()).with_side_effect(self.side_effect.clone()))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    Ok(ExecutionTimeValue::fixed(self.value.clone()).with_side_effect(self.side_effect.clone()))
  }

  fn producer(&self) -> ValueProducer {
    ValueProducer::NoProducer
  }
}

pub(super) struct MissingProvider {
  missing: Missing,
}

impl MissingProvider {
  pub(super) fn new(missing: Missing) -> Self {
    Self { missing }
  }
}

impl EvaluationOwner for MissingProvider {
  fn describe(&self) -> String {
    "undefined".to_string()
  }
}

impl<T: Data> ProviderInternal<T> for MissingProvider {
  fn calculate_presence(&self, _consumer: ValueConsumer) -> Result<bool, ProviderError> {
    Ok(false)
  }

  fn calculate_value(&self, _consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    Ok(Value::Missing(self.missing.clone()))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    Ok(ExecutionTimeValue::missing())
  }

  fn producer(&self) -> ValueProducer {
    ValueProducer::NoProducer
  }
}

type Callable<T> = Arc<dyn Fn() -> Result<Option<T>, ProviderError> + Send + Sync>;

/// Calls a function on every read.
pub(super) struct CallableProvider<T> {
  callable: Callable<T>,
}

impl<T> Clone for CallableProvider<T> {
  fn clone(&self) -> Self {
    Self {
      callable: self.callable.clone(),
    }
  }
}

impl<T: Data> CallableProvider<T> {
  pub(super) fn new(callable: Callable<T>) -> Self {
    Self { callable }
  }
}

impl<T: Data> EvaluationOwner for CallableProvider<T> {
  fn describe(&self) -> String {
    format!("provider({})", std::any::type_name::<T>())
  }
}

impl<T: Data> ProviderInternal<T> for CallableProvider<T> {
  fn calculate_value(&self, _consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    Ok(Value::of_option((self.callable)()?))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    Ok(ExecutionTimeValue::changing(Provider::new(self.clone())))
  }
}

/// A value known now whose content is produced elsewhere.
pub(super) struct ChangingContentProvider<T> {
  value: T,
  producer: ValueProducer,
}

impl<T: Data> ChangingContentProvider<T> {
  pub(super) fn new(value: T, producer: ValueProducer) -> Self {
    Self { value, producer }
  }
}

impl<T: Data> EvaluationOwner for ChangingContentProvider<T> {
  fn describe(&self) -> String {
    format!("content({:?})", self.value)
  }
}

impl<T: Data> ProviderInternal<T> for ChangingContentProvider<T> {
  fn calculate_presence(&self, _consumer: ValueConsumer) -> Result<bool, ProviderError> {
    Ok(true)
  }

  fn calculate_value(&self, _consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    Ok(Value::of(self.value.clone()))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    Ok(ExecutionTimeValue::fixed(self.value.clone()).with_changing_content())
  }

  fn producer(&self) -> ValueProducer {
    self.producer.clone()
  }
}
