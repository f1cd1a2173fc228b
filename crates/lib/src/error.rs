//! Errors raised while configuring or querying providers and properties.

use thiserror::Error;

use crate::eval::EvaluationCycle;
use crate::value::DisplayName;

/// Errors that can occur when mutating or reading lazy values.
#[derive(Debug, Error)]
pub enum ProviderError {
  /// A value was required but the provider has none.
  #[error("{}", render_missing(.subject, .path))]
  MissingValue { subject: String, path: Vec<DisplayName> },

  /// A provider was re-entered while it was already being evaluated on this thread.
  #[error("circular evaluation detected: {0}")]
  CircularEvaluation(EvaluationCycle),

  /// A mutation was attempted after the value was finalized.
  #[error("the value for {property} is final and cannot be changed any further")]
  FinalValue { property: String },

  /// A mutation was attempted after changes were disallowed.
  #[error("the value for {property} cannot be changed any further")]
  ChangesDisallowed { property: String },

  /// A collector chain head was extended a second time.
  #[error("something has been appended to this collector chain already")]
  ChainAlreadyExtended,

  /// The host refused a read because the upstream work is not ready.
  #[error("cannot query the value of {subject} because {reason}")]
  UnsafeRead { subject: String, reason: String },

  /// A filter was evaluated while the task producing its input content is still running.
  #[error("querying the filtered value of {subject} before {task} has completed is not supported")]
  ContentNotReady { subject: String, task: String },

  /// Computing the value of a property failed.
  #[error("failed to query the value of {property}")]
  Query {
    property: String,
    #[source]
    source: Box<ProviderError>,
  },

  /// An error raised by user supplied code inside a transformer.
  #[error(transparent)]
  Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
  /// Creates an error for a user supplied transformer failure.
  pub fn other(message: impl Into<String>) -> Self {
    let message: String = message.into();
    Self::Other(message.into())
  }

  /// Unwraps any `Query` layers and returns the innermost error.
  pub fn root_cause(&self) -> &ProviderError {
    let mut current = self;
    while let ProviderError::Query { source, .. } = current {
      current = source;
    }
    current
  }

  /// Returns the evaluation cycle if this error (or its root cause) is a circular evaluation.
  pub fn cycle(&self) -> Option<&EvaluationCycle> {
    match self.root_cause() {
      ProviderError::CircularEvaluation(cycle) => Some(cycle),
      _ => None,
    }
  }

  pub fn is_missing_value(&self) -> bool {
    matches!(self.root_cause(), ProviderError::MissingValue { .. })
  }
}

fn render_missing(subject: &str, path: &[DisplayName]) -> String {
  let mut message = format!("cannot query the value of {subject} because it has no value available");
  if !path.is_empty() {
    message.push_str("\nthe value of this provider is derived from:");
    for name in path {
      message.push_str("\n  - ");
      message.push_str(name.as_str());
    }
  }
  message
}
