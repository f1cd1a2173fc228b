//! Providers that derive a value from a single upstream provider.

use std::sync::Arc;

use super::{Provider, ProviderInternal, ValueConsumer};
use crate::error::ProviderError;
use crate::eval::EvaluationOwner;
use crate::producer::ValueProducer;
use crate::value::{Data, ExecutionTimeValue, Missing, SideEffect, Value};

pub(super) type Transformer<T, R> = Arc<dyn Fn(T) -> Result<Option<R>, ProviderError> + Send + Sync>;

type Binder<T, R> = Arc<dyn Fn(T) -> Result<Provider<R>, ProviderError> + Send + Sync>;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// The provider an upstream value binds to, or why there is none.
type Backing<R> = Result<(Provider<R>, Option<SideEffect<R>>), Missing>;

pub(super) struct MapProvider<T: Data, R> {
  label: &'static str,
  upstream: Provider<T>,
  transformer: Transformer<T, R>,
}

impl<T: Data, R> Clone for MapProvider<T, R> {
  fn clone(&self) -> Self {
    Self {
      label: self.label,
      upstream: self.upstream.clone(),
      transformer: self.transformer.clone(),
    }
  }
}

impl<T: Data, R: Data> MapProvider<T, R> {
  pub(super) fn new(label: &'static str, upstream: Provider<T>, transformer: Transformer<T, R>) -> Self {
    Self {
      label,
      upstream,
      transformer,
    }
  }
}

impl<T: Data, R: Data> EvaluationOwner for MapProvider<T, R> {
  fn describe(&self) -> String {
    format!("{}({})", self.label, self.upstream)
  }
}

impl<T: Data, R: Data> ProviderInternal<R> for MapProvider<T, R> {
  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<R>, ProviderError> {
    self
      .upstream
      .calculate_value(consumer)?
      .try_transform(|value| (self.transformer)(value))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<R>, ProviderError> {
    match self.upstream.calculate_execution_time_value()? {
      ExecutionTimeValue::Missing => Ok(ExecutionTimeValue::missing()),
      ExecutionTimeValue::Fixed {
        value,
        changing_content: false,
        side_effect,
      } => {
        let transformed = Value::Present { value, side_effect }.try_transform(|value| (self.transformer)(value))?;
        Ok(ExecutionTimeValue::from_value(transformed))
      }
      _ => Ok(ExecutionTimeValue::changing(Provider::new(self.clone()))),
    }
  }

  fn producer(&self) -> ValueProducer {
    self.upstream.producer()
  }
}

pub(super) struct FlatMapProvider<T: Data, R: Data> {
  upstream: Provider<T>,
  binder: Binder<T, R>,
}

impl<T: Data, R: Data> Clone for FlatMapProvider<T, R> {
  fn clone(&self) -> Self {
    Self {
      upstream: self.upstream.clone(),
      binder: self.binder.clone(),
    }
  }
}

impl<T: Data, R: Data> FlatMapProvider<T, R> {
  pub(super) fn new(upstream: Provider<T>, binder: Binder<T, R>) -> Self {
    Self { upstream, binder }
  }

  /// The provider the upstream value binds to, with the upstream side effect fixed to that value.
  fn backing(&self, consumer: ValueConsumer) -> Result<Backing<R>, ProviderError> {
    let (value, side_effect) = match self.upstream.calculate_value(consumer)?.into_parts() {
      Ok(parts) => parts,
      Err(missing) => return Ok(Err(missing)),
    };
    let fixed = side_effect.map(|effect| SideEffect::fixed(value.clone(), effect));
    Ok(Ok(((self.binder)(value)?, fixed)))
  }
}

impl<T: Data, R: Data> EvaluationOwner for FlatMapProvider<T, R> {
  fn describe(&self) -> String {
    format!("flat_map({})", self.upstream)
  }
}

impl<T: Data, R: Data> ProviderInternal<R> for FlatMapProvider<T, R> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    match self.backing(consumer)? {
      Ok((provider, _)) => provider.calculate_presence(consumer),
      Err(_) => Ok(false),
    }
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<R>, ProviderError> {
    match self.backing(consumer)? {
      Ok((provider, fixed)) => Ok(provider.calculate_value(consumer)?.with_side_effect(fixed)),
      Err(missing) => Ok(Value::Missing(missing)),
    }
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<R>, ProviderError> {
    match self.upstream.calculate_execution_time_value()? {
      ExecutionTimeValue::Missing => Ok(ExecutionTimeValue::missing()),
      ExecutionTimeValue::Fixed {
        value,
        changing_content: false,
        side_effect,
      } => {
        let fixed = side_effect.map(|effect| SideEffect::fixed(value.clone(), effect));
        let provider = (self.binder)(value)?;
        Ok(provider.calculate_execution_time_value()?.with_side_effect(fixed))
      }
      _ => Ok(ExecutionTimeValue::changing(Provider::new(self.clone()))),
    }
  }

  fn producer(&self) -> ValueProducer {
    match self.backing(ValueConsumer::IgnoreUnsafeRead) {
      Ok(Ok((provider, _))) => provider.producer(),
      Ok(Err(_)) => self.upstream.producer(),
      Err(_) => ValueProducer::Unknown,
    }
  }
}

pub(super) struct FilterProvider<T: Data> {
  upstream: Provider<T>,
  predicate: Predicate<T>,
}

impl<T: Data> Clone for FilterProvider<T> {
  fn clone(&self) -> Self {
    Self {
      upstream: self.upstream.clone(),
      predicate: self.predicate.clone(),
    }
  }
}

impl<T: Data> FilterProvider<T> {
  pub(super) fn new(upstream: Provider<T>, predicate: Predicate<T>) -> Self {
    Self { upstream, predicate }
  }

  fn ensure_content_ready(&self) -> Result<(), ProviderError> {
    let mut pending = None;
    self.upstream.producer().visit_content_producer_tasks(&mut |task| {
      if pending.is_none() && !task.has_completed() {
        pending = Some(task.path().to_string());
      }
    });
    match pending {
      Some(path) => Err(ProviderError::ContentNotReady {
        subject: self.describe(),
        task: format!("task '{path}'"),
      }),
      None => Ok(()),
    }
  }

  fn apply(&self, value: Value<T>) -> Value<T> {
    let rejected = value
      .get_without_side_effect()
      .is_some_and(|inner| !(self.predicate)(inner));
    if rejected { Value::missing() } else { value }
  }
}

impl<T: Data> EvaluationOwner for FilterProvider<T> {
  fn describe(&self) -> String {
    format!("filter({})", self.upstream)
  }
}

impl<T: Data> ProviderInternal<T> for FilterProvider<T> {
  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    self.ensure_content_ready()?;
    Ok(self.apply(self.upstream.calculate_value(consumer)?))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    match self.upstream.calculate_execution_time_value()? {
      ExecutionTimeValue::Missing => Ok(ExecutionTimeValue::missing()),
      ExecutionTimeValue::Fixed {
        value,
        changing_content: false,
        side_effect,
      } => Ok(ExecutionTimeValue::from_value(
        self.apply(Value::Present { value, side_effect }),
      )),
      _ => Ok(ExecutionTimeValue::changing(Provider::new(self.clone()))),
    }
  }

  fn producer(&self) -> ValueProducer {
    self.upstream.producer()
  }
}
