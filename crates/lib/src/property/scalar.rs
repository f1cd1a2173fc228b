//! Scalar properties backed by a single provider.

use std::sync::Arc;

use super::{DetachedHost, PropertyCore, PropertyHost, Supplier, property_api};
use crate::error::ProviderError;
use crate::producer::ValueProducer;
use crate::provider::{Provider, ValueConsumer};
use crate::value::{Data, DisplayName, ExecutionTimeValue, Value};

impl<T: Data> Supplier<T> for Provider<T> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    Provider::calculate_presence(self, consumer)
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    Provider::calculate_value(self, consumer)
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    Provider::calculate_execution_time_value(self)
  }

  fn producer(&self) -> ValueProducer {
    Provider::producer(self)
  }

  fn resolved(value: Value<T>) -> Self {
    Provider::resolved(value)
  }

  fn from_execution_time_value(value: ExecutionTimeValue<T>) -> Self {
    value.to_provider()
  }

  fn from_provider(provider: Provider<T>) -> Self {
    provider
  }

  fn to_provider(&self) -> Provider<T> {
    self.clone()
  }

  fn no_value() -> Self {
    Provider::missing()
  }

  fn describe(&self) -> String {
    self.to_string()
  }
}

/// A mutable lazy value of type `T`.
///
/// Cloning a `Property` yields another handle to the same property.
pub struct Property<T: Data> {
  core: Arc<PropertyCore<T, Provider<T>>>,
  provider: Provider<T>,
}

impl<T: Data> Clone for Property<T> {
  fn clone(&self) -> Self {
    Self {
      core: self.core.clone(),
      provider: self.provider.clone(),
    }
  }
}

impl<T: Data> Default for Property<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Data> Property<T> {
  pub fn new() -> Self {
    Self::with_host(Arc::new(DetachedHost))
  }

  /// Creates a property displayed as `property 'name'`.
  pub fn named(name: &str) -> Self {
    let property = Self::new();
    property.attach_display_name(DisplayName::property(name));
    property
  }

  pub fn with_host(host: Arc<dyn PropertyHost>) -> Self {
    let core = Arc::new(PropertyCore::new(
      host,
      "property",
      Provider::missing(),
      Provider::missing(),
    ));
    let provider = Provider::from_arc(core.clone());
    Self { core, provider }
  }

  property_api!(T);

  /// Sets the value. `None` discards it, falling back to the convention.
  pub fn set(&self, value: impl Into<Option<T>>) -> Result<(), ProviderError> {
    match value.into() {
      Some(value) => self.core.set_supplier(Provider::of(value)),
      None => self.core.unset(),
    }
  }

  /// Discards the value, falling back to the convention.
  pub fn set_none(&self) -> Result<(), ProviderError> {
    self.core.unset()
  }

  pub fn value(&self, value: impl Into<Option<T>>) -> Result<&Self, ProviderError> {
    self.set(value)?;
    Ok(self)
  }

  /// Uses `value` whenever no value has been set explicitly. `None` removes the convention.
  pub fn convention(&self, value: impl Into<Option<T>>) -> Result<&Self, ProviderError> {
    match value.into() {
      Some(value) => self.core.set_convention(Provider::of(value))?,
      None => self.core.unset_convention()?,
    }
    Ok(self)
  }
}

impl<T: Data> std::fmt::Debug for Property<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Property({})", self.provider)
  }
}
