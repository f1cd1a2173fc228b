//! Providers combining several upstream providers.

use std::sync::Arc;

use super::{Provider, ProviderInternal, ValueConsumer};
use crate::error::ProviderError;
use crate::eval::EvaluationOwner;
use crate::producer::ValueProducer;
use crate::value::{Data, ExecutionTimeValue, SideEffect, SideEffectBuilder, Value};

pub(super) struct OrElseProvider<T: Data> {
  left: Provider<T>,
  right: Provider<T>,
}

impl<T: Data> OrElseProvider<T> {
  pub(super) fn new(left: Provider<T>, right: Provider<T>) -> Self {
    Self { left, right }
  }
}

impl<T: Data> EvaluationOwner for OrElseProvider<T> {
  fn describe(&self) -> String {
    format!("or({}, {})", self.left, self.right)
  }
}

impl<T: Data> ProviderInternal<T> for OrElseProvider<T> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    Ok(self.left.calculate_presence(consumer)? || self.right.calculate_presence(consumer)?)
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    let left = match self.left.calculate_value(consumer)? {
      Value::Missing(missing) => missing,
      present => return Ok(present),
    };
    match self.right.calculate_value(consumer)? {
      Value::Missing(right) => Ok(Value::Missing(left.add_paths_from(right))),
      present => Ok(present),
    }
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    let left = self.left.calculate_execution_time_value()?;
    if left.has_fixed_value() {
      return Ok(left);
    }
    let right = self.right.calculate_execution_time_value()?;
    if left.is_missing() {
      return Ok(right);
    }
    if right.is_missing() {
      return Ok(left);
    }
    Ok(ExecutionTimeValue::changing(Provider::new(OrElseProvider::new(
      left.to_provider(),
      right.to_provider(),
    ))))
  }

  fn producer(&self) -> ValueProducer {
    self.left.producer().plus(self.right.producer())
  }
}

type Combiner<A, B, R> = Arc<dyn Fn(A, B) -> R + Send + Sync>;

pub(super) struct ZipProvider<A: Data, B: Data, R> {
  left: Provider<A>,
  right: Provider<B>,
  combiner: Combiner<A, B, R>,
}

impl<A: Data, B: Data, R> Clone for ZipProvider<A, B, R> {
  fn clone(&self) -> Self {
    Self {
      left: self.left.clone(),
      right: self.right.clone(),
      combiner: self.combiner.clone(),
    }
  }
}

impl<A: Data, B: Data, R: Data> ZipProvider<A, B, R> {
  pub(super) fn new(left: Provider<A>, right: Provider<B>, combiner: Combiner<A, B, R>) -> Self {
    Self { left, right, combiner }
  }
}

impl<A: Data, B: Data, R: Data> EvaluationOwner for ZipProvider<A, B, R> {
  fn describe(&self) -> String {
    format!("zip({}, {})", self.left, self.right)
  }
}

impl<A: Data, B: Data, R: Data> ProviderInternal<R> for ZipProvider<A, B, R> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    Ok(self.left.calculate_presence(consumer)? && self.right.calculate_presence(consumer)?)
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<R>, ProviderError> {
    let (left, left_effect) = match self.left.calculate_value(consumer)?.into_parts() {
      Ok(parts) => parts,
      Err(missing) => return Ok(Value::Missing(missing)),
    };
    let (right, right_effect) = match self.right.calculate_value(consumer)?.into_parts() {
      Ok(parts) => parts,
      Err(missing) => return Ok(Value::Missing(missing)),
    };
    let side_effect = SideEffect::composite([
      left_effect.map(|effect| SideEffect::fixed(left.clone(), effect)),
      right_effect.map(|effect| SideEffect::fixed(right.clone(), effect)),
    ]);
    Ok(Value::of((self.combiner)(left, right)).with_side_effect(side_effect))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<R>, ProviderError> {
    let left = self.left.calculate_execution_time_value()?;
    let right = self.right.calculate_execution_time_value()?;
    if left.is_changing_value() || right.is_changing_value() {
      return Ok(ExecutionTimeValue::changing(Provider::new(self.clone())));
    }
    match (left, right) {
      (
        ExecutionTimeValue::Fixed {
          value: left,
          changing_content: left_changing,
          side_effect: left_effect,
        },
        ExecutionTimeValue::Fixed {
          value: right,
          changing_content: right_changing,
          side_effect: right_effect,
        },
      ) => {
        let side_effect = SideEffect::composite([
          left_effect.map(|effect| SideEffect::fixed(left.clone(), effect)),
          right_effect.map(|effect| SideEffect::fixed(right.clone(), effect)),
        ]);
        Ok(ExecutionTimeValue::Fixed {
          value: (self.combiner)(left, right),
          changing_content: left_changing || right_changing,
          side_effect,
        })
      }
      _ => Ok(ExecutionTimeValue::missing()),
    }
  }

  fn producer(&self) -> ValueProducer {
    self.left.producer().plus(self.right.producer())
  }
}

pub(super) struct MergeProvider<T: Data> {
  items: Vec<Provider<T>>,
}

impl<T: Data> Clone for MergeProvider<T> {
  fn clone(&self) -> Self {
    Self {
      items: self.items.clone(),
    }
  }
}

impl<T: Data> MergeProvider<T> {
  pub(super) fn new(items: Vec<Provider<T>>) -> Self {
    Self { items }
  }
}

impl<T: Data> EvaluationOwner for MergeProvider<T> {
  fn describe(&self) -> String {
    let items: Vec<String> = self.items.iter().map(ToString::to_string).collect();
    format!("merge({})", items.join(", "))
  }
}

impl<T: Data> ProviderInternal<Vec<T>> for MergeProvider<T> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    for item in &self.items {
      if !item.calculate_presence(consumer)? {
        return Ok(false);
      }
    }
    Ok(true)
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<Vec<T>>, ProviderError> {
    let mut values = Vec::with_capacity(self.items.len());
    let mut side_effects = SideEffectBuilder::new();
    for item in &self.items {
      match item.calculate_value(consumer)?.into_parts() {
        Ok((value, side_effect)) => {
          side_effects.add(side_effect.map(|effect| SideEffect::fixed(value.clone(), effect)));
          values.push(value);
        }
        Err(missing) => return Ok(Value::Missing(missing)),
      }
    }
    Ok(Value::of(values).with_side_effect(side_effects.build()))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<Vec<T>>, ProviderError> {
    let mut results = Vec::with_capacity(self.items.len());
    for item in &self.items {
      results.push(item.calculate_execution_time_value()?);
    }
    if results.iter().any(ExecutionTimeValue::is_changing_value) {
      return Ok(ExecutionTimeValue::changing(Provider::new(self.clone())));
    }
    let mut values = Vec::with_capacity(results.len());
    let mut changing_content = false;
    let mut side_effects = SideEffectBuilder::new();
    for result in results {
      match result {
        ExecutionTimeValue::Fixed {
          value,
          changing_content: content,
          side_effect,
        } => {
          changing_content |= content;
          side_effects.add(side_effect.map(|effect| SideEffect::fixed(value.clone(), effect)));
          values.push(value);
        }
        _ => return Ok(ExecutionTimeValue::missing()),
      }
    }
    Ok(ExecutionTimeValue::Fixed {
      value: values,
      changing_content,
      side_effect: side_effects.build(),
    })
  }

  fn producer(&self) -> ValueProducer {
    self.items.iter().map(Provider::producer).collect()
  }
}

pub(super) struct SideEffectProvider<T: Data> {
  upstream: Provider<T>,
  side_effect: SideEffect<T>,
}

impl<T: Data> SideEffectProvider<T> {
  pub(super) fn new(upstream: Provider<T>, side_effect: SideEffect<T>) -> Self {
    Self { upstream, side_effect }
  }
}

impl<T: Data> EvaluationOwner for SideEffectProvider<T> {
  fn describe(&self) -> String {
    format!("with_side_effect({}, {})", self.upstream, self.side_effect)
  }
}

impl<T: Data> ProviderInternal<T> for SideEffectProvider<T> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    self.upstream.calculate_presence(consumer)
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    Ok(
      self
        .upstream
        .calculate_value(consumer)?
        .with_side_effect(Some(self.side_effect.clone())),
    )
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    Ok(
      self
        .upstream
        .calculate_execution_time_value()?
        .with_side_effect(Some(self.side_effect.clone())),
    )
  }

  fn producer(&self) -> ValueProducer {
    self.upstream.producer()
  }
}
