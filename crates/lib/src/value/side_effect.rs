//! Deferred actions attached to values.

use std::fmt;
use std::sync::Arc;

use super::{Data, ExecutionTimeValue, Value};

/// An action run against a value when that value is consumed.
///
/// Side effects are immutable and cheap to clone. A *fixed* side effect has
/// already captured the value it runs against, which lets it survive
/// transformations that change the payload type.
pub struct SideEffect<T> {
  kind: Kind<T>,
}

enum Kind<T> {
  Action {
    label: Arc<str>,
    run: Arc<dyn Fn(&T) + Send + Sync>,
  },
  Fixed(Arc<dyn FixedEffect>),
  Composite(Arc<[SideEffect<T>]>),
}

trait FixedEffect: Send + Sync {
  fn run(&self);
  fn describe(&self) -> String;
}

struct Captured<A> {
  value: A,
  effect: SideEffect<A>,
}

impl<A: Data> FixedEffect for Captured<A> {
  fn run(&self) {
    self.effect.execute(&self.value);
  }

  fn describe(&self) -> String {
    format!("fixed({:?}, {})", self.value, self.effect)
  }
}

impl<T: 'static> SideEffect<T> {
  pub fn new(run: impl Fn(&T) + Send + Sync + 'static) -> Self {
    Self::named("side effect", run)
  }

  /// Creates a side effect with a label used in diagnostics.
  pub fn named(label: &str, run: impl Fn(&T) + Send + Sync + 'static) -> Self {
    Self {
      kind: Kind::Action {
        label: Arc::from(label),
        run: Arc::new(run),
      },
    }
  }

  /// Binds `effect` to `value` so it runs against `value` whatever payload it is later attached to.
  pub fn fixed<A: Data>(value: A, effect: SideEffect<A>) -> Self {
    if let Kind::Fixed(captured) = &effect.kind {
      return Self {
        kind: Kind::Fixed(captured.clone()),
      };
    }
    Self {
      kind: Kind::Fixed(Arc::new(Captured { value, effect })),
    }
  }

  /// Fixes the side effect of a present value, if it has one.
  pub fn fixed_from<A: Data>(value: &Value<A>) -> Option<Self> {
    match value {
      Value::Present {
        value,
        side_effect: Some(effect),
      } => Some(Self::fixed(value.clone(), effect.clone())),
      _ => None,
    }
  }

  /// Fixes the side effect of a fixed execution time value, if it has one.
  pub fn fixed_from_execution_time<A: Data>(value: &ExecutionTimeValue<A>) -> Option<Self> {
    match (value.fixed_value(), value.side_effect()) {
      (Some(fixed), Some(effect)) => Some(Self::fixed(fixed.clone(), effect.clone())),
      _ => None,
    }
  }

  /// Combines side effects in order, flattening nested composites.
  pub fn composite(effects: impl IntoIterator<Item = Option<SideEffect<T>>>) -> Option<Self> {
    let mut flat: Vec<SideEffect<T>> = Vec::new();
    for effect in effects.into_iter().flatten() {
      match &effect.kind {
        Kind::Composite(children) => flat.extend(children.iter().cloned()),
        _ => flat.push(effect),
      }
    }
    match flat.len() {
      0 => None,
      1 => flat.pop(),
      _ => Some(Self {
        kind: Kind::Composite(flat.into()),
      }),
    }
  }

  pub fn is_fixed(&self) -> bool {
    matches!(self.kind, Kind::Fixed(_))
  }

  pub fn execute(&self, value: &T) {
    match &self.kind {
      Kind::Action { run, .. } => run(value),
      Kind::Fixed(captured) => captured.run(),
      Kind::Composite(children) => {
        for child in children.iter() {
          child.execute(value);
        }
      }
    }
  }
}

impl<T> Clone for SideEffect<T> {
  fn clone(&self) -> Self {
    let kind = match &self.kind {
      Kind::Action { label, run } => Kind::Action {
        label: label.clone(),
        run: run.clone(),
      },
      Kind::Fixed(captured) => Kind::Fixed(captured.clone()),
      Kind::Composite(children) => Kind::Composite(children.clone()),
    };
    Self { kind }
  }
}

impl<T> fmt::Display for SideEffect<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      Kind::Action { label, .. } => f.write_str(label),
      Kind::Fixed(captured) => f.write_str(&captured.describe()),
      Kind::Composite(children) => {
        let parts: Vec<String> = children.iter().map(ToString::to_string).collect();
        write!(f, "composite({})", parts.join(", "))
      }
    }
  }
}

impl<T> fmt::Debug for SideEffect<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

/// Accumulates optional side effects into a single composite.
pub struct SideEffectBuilder<T> {
  effects: Vec<SideEffect<T>>,
}

impl<T: 'static> SideEffectBuilder<T> {
  pub fn new() -> Self {
    Self { effects: Vec::new() }
  }

  pub fn add(&mut self, effect: Option<SideEffect<T>>) -> &mut Self {
    if let Some(effect) = effect {
      self.effects.push(effect);
    }
    self
  }

  pub fn build(self) -> Option<SideEffect<T>> {
    SideEffect::composite(self.effects.into_iter().map(Some))
  }
}

impl<T: 'static> Default for SideEffectBuilder<T> {
  fn default() -> Self {
    Self::new()
  }
}
