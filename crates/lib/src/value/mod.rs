//! The value algebra shared by providers and properties.
//!
//! A [`Value`] is the result of calculating a provider now: either a present
//! value (optionally carrying a [`SideEffect`]) or a [`Missing`] marker that
//! records the chain of display names the absence was derived from.
//!
//! An [`ExecutionTimeValue`] is what a provider reports when asked what it
//! will be at execution time: missing, fixed, or still changing.

mod execution_time;
mod side_effect;

pub use execution_time::{ExecutionTimeKind, ExecutionTimeValue};
pub use side_effect::{SideEffect, SideEffectBuilder};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bound shared by every type that flows through a provider graph.
pub trait Data: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> Data for T {}

/// Human readable name of a property or provider, used in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  /// The conventional name of a property: `property 'name'`.
  pub fn property(name: &str) -> Self {
    Self(format!("property '{name}'"))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for DisplayName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for DisplayName {
  fn from(name: &str) -> Self {
    Self::new(name)
  }
}

impl From<String> for DisplayName {
  fn from(name: String) -> Self {
    Self(name)
  }
}

/// Marker for an absent value, carrying where the absence came from.
///
/// The path lists display names outermost first. An empty path means no
/// diagnostic information is available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Missing {
  path: Vec<DisplayName>,
}

impl Missing {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn path(&self) -> &[DisplayName] {
    &self.path
  }

  pub fn into_path(self) -> Vec<DisplayName> {
    self.path
  }

  /// Records that the absence was observed through `name`.
  pub fn push(mut self, name: DisplayName) -> Self {
    self.path.insert(0, name);
    self
  }

  /// Merges the path of another absence into this one.
  ///
  /// When this path is empty the other marker is returned as is, so the
  /// result reads as if it came from `other` alone.
  pub fn add_paths_from(mut self, other: Missing) -> Missing {
    if self.path.is_empty() {
      return other;
    }
    if other.path.is_empty() {
      return self;
    }
    self.path.extend(other.path);
    self
  }
}

impl fmt::Display for Missing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.path.is_empty() {
      return f.write_str("missing");
    }
    let names: Vec<&str> = self.path.iter().map(DisplayName::as_str).collect();
    write!(f, "missing(path=[{}])", names.join(", "))
  }
}

/// The calculated value of a provider.
pub enum Value<T> {
  /// No value, with diagnostics describing why.
  Missing(Missing),

  /// A value, plus an effect to run when the value is consumed.
  Present { value: T, side_effect: Option<SideEffect<T>> },
}

impl<T> Value<T> {
  pub fn of(value: T) -> Self {
    Value::Present {
      value,
      side_effect: None,
    }
  }

  pub fn of_option(value: Option<T>) -> Self {
    match value {
      Some(value) => Value::of(value),
      None => Value::missing(),
    }
  }

  pub fn missing() -> Self {
    Value::Missing(Missing::new())
  }

  pub fn is_missing(&self) -> bool {
    matches!(self, Value::Missing(_))
  }

  pub fn is_present(&self) -> bool {
    !self.is_missing()
  }

  pub fn missing_path(&self) -> Option<&[DisplayName]> {
    match self {
      Value::Missing(missing) => Some(missing.path()),
      Value::Present { .. } => None,
    }
  }

  /// Returns the value without running its side effect.
  pub fn get_without_side_effect(&self) -> Option<&T> {
    match self {
      Value::Present { value, .. } => Some(value),
      Value::Missing(_) => None,
    }
  }

  pub fn side_effect(&self) -> Option<&SideEffect<T>> {
    match self {
      Value::Present { side_effect, .. } => side_effect.as_ref(),
      Value::Missing(_) => None,
    }
  }

  /// Splits a present value into its payload and side effect without running the effect.
  pub fn into_parts(self) -> Result<(T, Option<SideEffect<T>>), Missing> {
    match self {
      Value::Present { value, side_effect } => Ok((value, side_effect)),
      Value::Missing(missing) => Err(missing),
    }
  }

  /// Consumes the value, running its side effect when present.
  pub fn into_result(self) -> Result<T, Missing>
  where
    T: 'static,
  {
    let (value, side_effect) = self.into_parts()?;
    if let Some(side_effect) = &side_effect {
      side_effect.execute(&value);
    }
    Ok(value)
  }

  /// Consumes the value, running its side effect when present.
  pub fn get(self) -> Option<T>
  where
    T: 'static,
  {
    self.into_result().ok()
  }

  pub fn or_else(self, default: T) -> T
  where
    T: 'static,
  {
    self.get().unwrap_or(default)
  }

  /// Attaches a side effect, composing with any existing one.
  pub fn with_side_effect(self, extra: Option<SideEffect<T>>) -> Self
  where
    T: 'static,
  {
    match (self, extra) {
      (value, None) => value,
      (Value::Missing(missing), Some(_)) => Value::Missing(missing),
      (Value::Present { value, side_effect }, Some(extra)) => Value::Present {
        value,
        side_effect: SideEffect::composite([side_effect, Some(extra)]),
      },
    }
  }

  /// Records `name` on the missing path; present values are returned unchanged.
  pub fn push_when_missing(self, name: Option<&DisplayName>) -> Self {
    match (self, name) {
      (Value::Missing(missing), Some(name)) => Value::Missing(missing.push(name.clone())),
      (value, _) => value,
    }
  }
}

impl<T: Data> Value<T> {
  /// Maps the payload, keeping the original side effect bound to the original value.
  pub fn transform<R>(self, transformer: impl FnOnce(T) -> Option<R>) -> Value<R>
  where
    R: 'static,
  {
    match self.try_transform(|value| Ok::<_, std::convert::Infallible>(transformer(value))) {
      Ok(value) => value,
      Err(never) => match never {},
    }
  }

  /// Fallible form of [`Value::transform`].
  pub fn try_transform<R, E>(self, transformer: impl FnOnce(T) -> Result<Option<R>, E>) -> Result<Value<R>, E>
  where
    R: 'static,
  {
    match self {
      Value::Missing(missing) => Ok(Value::Missing(missing)),
      Value::Present {
        value,
        side_effect: None,
      } => Ok(Value::of_option(transformer(value)?)),
      Value::Present {
        value,
        side_effect: Some(side_effect),
      } => {
        let fixed = SideEffect::fixed(value.clone(), side_effect);
        Ok(match transformer(value)? {
          Some(result) => Value::Present {
            value: result,
            side_effect: Some(fixed),
          },
          None => Value::missing(),
        })
      }
    }
  }
}

impl Value<()> {
  /// A present unit value, used when only presence matters.
  pub fn present() -> Self {
    Value::of(())
  }
}

impl<T: Clone> Clone for Value<T> {
  fn clone(&self) -> Self {
    match self {
      Value::Missing(missing) => Value::Missing(missing.clone()),
      Value::Present { value, side_effect } => Value::Present {
        value: value.clone(),
        side_effect: side_effect.clone(),
      },
    }
  }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Missing(missing) => write!(f, "{missing}"),
      Value::Present {
        value,
        side_effect: None,
      } => write!(f, "value({value:?})"),
      Value::Present {
        value,
        side_effect: Some(side_effect),
      } => write!(f, "valueWithSideEffect({value:?}, {side_effect})"),
    }
  }
}
