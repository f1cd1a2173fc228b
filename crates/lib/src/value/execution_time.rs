//! Execution time values: what a provider will be when work actually runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Data, SideEffect, Value};
use crate::provider::Provider;

/// The shape of an [`ExecutionTimeValue`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTimeKind {
  Missing,
  Fixed,
  FixedWithChangingContent,
  Changing,
}

/// A provider's value as it will be at execution time.
pub enum ExecutionTimeValue<T: Data> {
  /// Known now to have no value.
  Missing,

  /// Known now. `changing_content` marks a value whose identity is fixed but
  /// whose content (e.g. a file produced by a task) may still change.
  Fixed {
    value: T,
    changing_content: bool,
    side_effect: Option<SideEffect<T>>,
  },

  /// Only known when execution happens; evaluate the provider then.
  Changing(Provider<T>),
}

impl<T: Data> ExecutionTimeValue<T> {
  pub fn missing() -> Self {
    ExecutionTimeValue::Missing
  }

  pub fn fixed(value: T) -> Self {
    ExecutionTimeValue::Fixed {
      value,
      changing_content: false,
      side_effect: None,
    }
  }

  pub fn of_option(value: Option<T>) -> Self {
    match value {
      Some(value) => Self::fixed(value),
      None => Self::missing(),
    }
  }

  /// Converts a calculated value, keeping its side effect.
  pub fn from_value(value: Value<T>) -> Self {
    match value {
      Value::Missing(_) => ExecutionTimeValue::Missing,
      Value::Present { value, side_effect } => ExecutionTimeValue::Fixed {
        value,
        changing_content: false,
        side_effect,
      },
    }
  }

  pub fn changing(provider: Provider<T>) -> Self {
    ExecutionTimeValue::Changing(provider)
  }

  pub fn kind(&self) -> ExecutionTimeKind {
    match self {
      ExecutionTimeValue::Missing => ExecutionTimeKind::Missing,
      ExecutionTimeValue::Fixed {
        changing_content: false,
        ..
      } => ExecutionTimeKind::Fixed,
      ExecutionTimeValue::Fixed {
        changing_content: true,
        ..
      } => ExecutionTimeKind::FixedWithChangingContent,
      ExecutionTimeValue::Changing(_) => ExecutionTimeKind::Changing,
    }
  }

  pub fn is_missing(&self) -> bool {
    matches!(self, ExecutionTimeValue::Missing)
  }

  pub fn has_fixed_value(&self) -> bool {
    matches!(self, ExecutionTimeValue::Fixed { .. })
  }

  pub fn is_changing_value(&self) -> bool {
    matches!(self, ExecutionTimeValue::Changing(_))
  }

  pub fn has_changing_content(&self) -> bool {
    matches!(
      self,
      ExecutionTimeValue::Fixed {
        changing_content: true,
        ..
      }
    )
  }

  pub fn fixed_value(&self) -> Option<&T> {
    match self {
      ExecutionTimeValue::Fixed { value, .. } => Some(value),
      _ => None,
    }
  }

  pub fn changing_value(&self) -> Option<&Provider<T>> {
    match self {
      ExecutionTimeValue::Changing(provider) => Some(provider),
      _ => None,
    }
  }

  pub fn side_effect(&self) -> Option<&SideEffect<T>> {
    match self {
      ExecutionTimeValue::Fixed { side_effect, .. } => side_effect.as_ref(),
      _ => None,
    }
  }

  /// Marks a fixed value as having changing content. Other states are unchanged.
  pub fn with_changing_content(self) -> Self {
    match self {
      ExecutionTimeValue::Fixed { value, side_effect, .. } => ExecutionTimeValue::Fixed {
        value,
        changing_content: true,
        side_effect,
      },
      other => other,
    }
  }

  /// Attaches a side effect. A changing value wraps its provider instead.
  pub fn with_side_effect(self, extra: Option<SideEffect<T>>) -> Self {
    let Some(extra) = extra else {
      return self;
    };
    match self {
      ExecutionTimeValue::Missing => ExecutionTimeValue::Missing,
      ExecutionTimeValue::Fixed {
        value,
        changing_content,
        side_effect,
      } => ExecutionTimeValue::Fixed {
        value,
        changing_content,
        side_effect: SideEffect::composite([side_effect, Some(extra)]),
      },
      ExecutionTimeValue::Changing(provider) => ExecutionTimeValue::Changing(provider.with_side_effect(extra)),
    }
  }

  /// Converts back to a calculated value. Returns `None` for a changing value.
  pub fn to_value(&self) -> Option<Value<T>> {
    match self {
      ExecutionTimeValue::Missing => Some(Value::missing()),
      ExecutionTimeValue::Fixed { value, side_effect, .. } => Some(Value::Present {
        value: value.clone(),
        side_effect: side_effect.clone(),
      }),
      ExecutionTimeValue::Changing(_) => None,
    }
  }

  /// A provider that reproduces this execution time value.
  pub fn to_provider(&self) -> Provider<T> {
    match self {
      ExecutionTimeValue::Missing => Provider::missing(),
      ExecutionTimeValue::Fixed {
        value,
        changing_content: false,
        side_effect,
      } => Provider::fixed(value.clone(), side_effect.clone()),
      ExecutionTimeValue::Fixed {
        value,
        changing_content: true,
        side_effect,
      } => {
        let provider = Provider::with_changing_content(value.clone());
        match side_effect {
          Some(effect) => provider.with_side_effect(effect.clone()),
          None => provider,
        }
      }
      ExecutionTimeValue::Changing(provider) => provider.clone(),
    }
  }
}

impl<T: Data> Clone for ExecutionTimeValue<T> {
  fn clone(&self) -> Self {
    match self {
      ExecutionTimeValue::Missing => ExecutionTimeValue::Missing,
      ExecutionTimeValue::Fixed {
        value,
        changing_content,
        side_effect,
      } => ExecutionTimeValue::Fixed {
        value: value.clone(),
        changing_content: *changing_content,
        side_effect: side_effect.clone(),
      },
      ExecutionTimeValue::Changing(provider) => ExecutionTimeValue::Changing(provider.clone()),
    }
  }
}

impl<T: Data> fmt::Debug for ExecutionTimeValue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExecutionTimeValue::Missing => f.write_str("missing"),
      ExecutionTimeValue::Fixed {
        value,
        changing_content,
        side_effect,
      } => {
        write!(f, "fixed({value:?}")?;
        if *changing_content {
          f.write_str(", changing content")?;
        }
        if let Some(effect) = side_effect {
          write!(f, ", {effect}")?;
        }
        f.write_str(")")
      }
      ExecutionTimeValue::Changing(provider) => write!(f, "changing({provider})"),
    }
  }
}
