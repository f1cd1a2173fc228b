//! The finalization state machine of a property.

use crate::error::ProviderError;
use crate::provider::ValueConsumer;

/// Lifecycle of a property's value.
///
/// A property starts non-finalized and moves to `Finalized` exactly once.
/// While non-finalized it tracks whether its value was set explicitly, which
/// guards are active, and its convention.
pub(crate) enum ValueState<S> {
  NonFinalized(Flags<S>),
  Finalized,
}

pub(crate) struct Flags<S> {
  explicit_value: bool,
  disallow_changes: bool,
  disallow_unsafe_read: bool,
  finalize_on_next_get: bool,
  convention: S,
}

impl<S: Clone> ValueState<S> {
  pub(crate) fn new(convention: S) -> Self {
    ValueState::NonFinalized(Flags {
      explicit_value: false,
      disallow_changes: false,
      disallow_unsafe_read: false,
      finalize_on_next_get: false,
      convention,
    })
  }

  pub(crate) fn is_finalized(&self) -> bool {
    matches!(self, ValueState::Finalized)
  }

  /// Whether the current value was set explicitly. A finalized value counts as explicit.
  pub(crate) fn is_explicit(&self) -> bool {
    match self {
      ValueState::NonFinalized(flags) => flags.explicit_value,
      ValueState::Finalized => true,
    }
  }

  /// Fails if the value may no longer be changed.
  pub(crate) fn begin_mutation(&self, subject: &str) -> Result<(), ProviderError> {
    match self {
      ValueState::Finalized => Err(ProviderError::FinalValue {
        property: subject.to_string(),
      }),
      ValueState::NonFinalized(flags) if flags.disallow_changes => Err(ProviderError::ChangesDisallowed {
        property: subject.to_string(),
      }),
      ValueState::NonFinalized(_) => Ok(()),
    }
  }

  /// Whether a read with `consumer` should finalize the value first.
  pub(crate) fn should_finalize(&self, consumer: ValueConsumer) -> bool {
    match self {
      ValueState::NonFinalized(flags) => {
        flags.finalize_on_next_get || consumer == ValueConsumer::DisallowUnsafeRead
      }
      ValueState::Finalized => false,
    }
  }

  /// Whether a read with `consumer` must first ask the host if upstream work is ready.
  pub(crate) fn requires_safe_read(&self, consumer: ValueConsumer) -> bool {
    match self {
      ValueState::NonFinalized(flags) => {
        flags.disallow_unsafe_read || consumer == ValueConsumer::DisallowUnsafeRead
      }
      ValueState::Finalized => false,
    }
  }

  /// The value to build on when mutating: the current value if explicit, otherwise `default`.
  pub(crate) fn explicit_value(&self, value: &S, default: &S) -> S {
    if self.is_explicit() { value.clone() } else { default.clone() }
  }

  /// Marks the value as explicitly set and returns it.
  pub(crate) fn set_explicit(&mut self, value: S) -> S {
    if let ValueState::NonFinalized(flags) = self {
      flags.explicit_value = true;
    }
    value
  }

  /// Clears the explicit flag and returns the convention to fall back to.
  pub(crate) fn implicit_value(&mut self) -> Option<S> {
    match self {
      ValueState::NonFinalized(flags) => {
        flags.explicit_value = false;
        Some(flags.convention.clone())
      }
      ValueState::Finalized => None,
    }
  }

  /// Replaces the convention. Returns the new convention if it should become the current value.
  pub(crate) fn set_convention(&mut self, convention: S) -> Option<S> {
    match self {
      ValueState::NonFinalized(flags) => {
        flags.convention = convention.clone();
        (!flags.explicit_value).then_some(convention)
      }
      ValueState::Finalized => None,
    }
  }

  /// If the value is not explicit, adopts the convention as the explicit value and returns it.
  pub(crate) fn adopt_convention(&mut self) -> Option<S> {
    match self {
      ValueState::NonFinalized(flags) if !flags.explicit_value => {
        flags.explicit_value = true;
        Some(flags.convention.clone())
      }
      _ => None,
    }
  }

  pub(crate) fn disallow_changes(&mut self) {
    if let ValueState::NonFinalized(flags) = self {
      flags.disallow_changes = true;
    }
  }

  pub(crate) fn finalize_on_next_get(&mut self) {
    if let ValueState::NonFinalized(flags) = self {
      flags.finalize_on_next_get = true;
    }
  }

  pub(crate) fn disallow_unsafe_read(&mut self) {
    if let ValueState::NonFinalized(flags) = self {
      flags.disallow_unsafe_read = true;
      flags.finalize_on_next_get = true;
    }
  }

  pub(crate) fn finalize(&mut self) {
    *self = ValueState::Finalized;
  }
}
