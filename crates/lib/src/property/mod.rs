//! Mutable properties: explicit values, conventions and finalization.
//!
//! Every property kind shares one cell, [`PropertyCore`], parameterised by the
//! supplier type that holds its current value: a plain [`Provider`] for scalar
//! properties, a collection supplier for list, set and map properties.
//!
//! The cell's mutable state sits behind a `parking_lot` mutex. Reads copy the
//! supplier out of the lock and evaluate it unlocked, so a property whose value
//! depends on itself reaches cycle detection instead of deadlocking.
//!
//! Finalization is best effort under concurrency: two threads finalizing the
//! same property may both evaluate the supplier. The first result stored wins
//! and later readers see it.

mod factory;
mod scalar;
mod state;

pub use factory::PropertyFactory;
pub use scalar::Property;

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::ProviderError;
use crate::eval::{self, EvaluationOwner};
use crate::producer::{TaskRef, ValueProducer};
use crate::provider::{Provider, ProviderInternal, ValueConsumer};
use crate::value::{Data, DisplayName, ExecutionTimeValue, Value};

use state::ValueState;

/// The environment a property lives in.
pub trait PropertyHost: Send + Sync {
  /// Returns the reason a read must be refused, or `None` if upstream work is ready.
  fn before_read(&self, producer: &ValueProducer) -> Option<String>;
}

/// A host with no external work: reads are always allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedHost;

impl PropertyHost for DetachedHost {
  fn before_read(&self, _producer: &ValueProducer) -> Option<String> {
    None
  }
}

/// A host that refuses reads while any producing task has not completed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProducerCompletionHost;

impl PropertyHost for ProducerCompletionHost {
  fn before_read(&self, producer: &ValueProducer) -> Option<String> {
    let mut reason = None;
    producer.visit_producer_tasks(&mut |task| {
      if reason.is_none() && !task.has_completed() {
        reason = Some(format!("task '{}' has not completed yet", task.path()));
      }
    });
    reason
  }
}

/// Storage for a property's current value.
pub(crate) trait Supplier<T: Data>: Clone + Send + Sync + 'static {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError>;

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError>;

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError>;

  fn producer(&self) -> ValueProducer;

  /// A supplier that always returns `value`, used when finalizing.
  fn resolved(value: Value<T>) -> Self;

  /// A supplier restoring a recorded execution time value.
  fn from_execution_time_value(value: ExecutionTimeValue<T>) -> Self;

  fn from_provider(provider: Provider<T>) -> Self;

  fn to_provider(&self) -> Provider<T>;

  /// The supplier of a property with no value and no convention.
  fn no_value() -> Self;

  /// A copy that may be extended without affecting this supplier.
  fn branch(&self) -> Self {
    self.clone()
  }

  fn describe(&self) -> String;
}

struct Inner<S> {
  state: ValueState<S>,
  value: S,
  default_value: S,
}

/// The shared cell behind every property kind.
pub(crate) struct PropertyCore<T: Data, S: Supplier<T>> {
  kind: &'static str,
  host: Arc<dyn PropertyHost>,
  display_name: Mutex<Option<DisplayName>>,
  attached_producer: Mutex<Option<TaskRef>>,
  inner: Mutex<Inner<S>>,
  _value: PhantomData<fn() -> T>,
}

impl<T: Data, S: Supplier<T>> PropertyCore<T, S> {
  /// Creates a cell whose value starts as `initial` and whose convention starts as `convention`.
  pub(crate) fn new(host: Arc<dyn PropertyHost>, kind: &'static str, initial: S, convention: S) -> Self {
    Self {
      kind,
      host,
      display_name: Mutex::new(None),
      attached_producer: Mutex::new(None),
      inner: Mutex::new(Inner {
        state: ValueState::new(convention),
        value: initial.clone(),
        default_value: initial,
      }),
      _value: PhantomData,
    }
  }

  pub(crate) fn display_name(&self) -> Option<DisplayName> {
    self.display_name.lock().clone()
  }

  /// Sets the display name unless one is already attached.
  pub(crate) fn attach_display_name(&self, name: DisplayName) {
    let mut current = self.display_name.lock();
    if current.is_none() {
      *current = Some(name);
    }
  }

  /// Declares that this property's value is produced by `task`.
  pub(crate) fn attach_producer(&self, task: TaskRef) {
    *self.attached_producer.lock() = Some(task);
  }

  fn subject_name(&self) -> String {
    match self.display_name() {
      Some(name) => name.to_string(),
      None => "this property".to_string(),
    }
  }

  /// Only named properties add a `Query` layer.
  fn query_failed(&self, source: ProviderError) -> ProviderError {
    match self.display_name() {
      Some(name) => ProviderError::Query {
        property: name.to_string(),
        source: Box::new(source),
      },
      None => source,
    }
  }

  /// A snapshot of the current supplier.
  pub(crate) fn supplier(&self) -> S {
    self.inner.lock().value.clone()
  }

  pub(crate) fn is_explicit(&self) -> bool {
    self.inner.lock().state.is_explicit()
  }

  fn mutate<R>(&self, change: impl FnOnce(&mut Inner<S>) -> Result<R, ProviderError>) -> Result<R, ProviderError> {
    let subject = self.subject_name();
    let mut inner = self.inner.lock();
    inner.state.begin_mutation(&subject)?;
    change(&mut inner)
  }

  /// Replaces the value with an explicit supplier.
  pub(crate) fn set_supplier(&self, supplier: S) -> Result<(), ProviderError> {
    self.mutate(|inner| {
      inner.value = inner.state.set_explicit(supplier);
      Ok(())
    })
  }

  /// Builds a new explicit value from the current explicit value, or the default if there is none.
  pub(crate) fn update_explicit(&self, update: impl FnOnce(S) -> Result<S, ProviderError>) -> Result<(), ProviderError> {
    self.mutate(|inner| {
      let explicit = inner.state.explicit_value(&inner.value, &inner.default_value);
      let next = update(explicit)?;
      inner.value = inner.state.set_explicit(next);
      Ok(())
    })
  }

  /// Like [`update_explicit`](Self::update_explicit), but first adopts the convention if the value is unset.
  pub(crate) fn update_actual(&self, update: impl FnOnce(S) -> Result<S, ProviderError>) -> Result<(), ProviderError> {
    let adopted = self.mutate(|inner| {
      let adopted = inner.state.adopt_convention();
      let current = match &adopted {
        Some(convention) => convention.branch(),
        None => inner.value.clone(),
      };
      let next = update(current)?;
      inner.value = inner.state.set_explicit(next);
      Ok(adopted.is_some())
    })?;
    if adopted {
      debug!(property = %self.subject_name(), "adopted convention as explicit value");
    }
    Ok(())
  }

  /// Returns to the convention.
  pub(crate) fn unset(&self) -> Result<(), ProviderError> {
    self.mutate(|inner| {
      if let Some(convention) = inner.state.implicit_value() {
        inner.value = convention.branch();
      }
      Ok(())
    })
  }

  /// Makes "no value" the default for future updates, then returns to the convention.
  pub(crate) fn unset_value_and_default(&self) -> Result<(), ProviderError> {
    self.mutate(|inner| {
      inner.default_value = S::no_value();
      if let Some(convention) = inner.state.implicit_value() {
        inner.value = convention.branch();
      }
      Ok(())
    })
  }

  pub(crate) fn set_convention(&self, convention: S) -> Result<(), ProviderError> {
    let applied = self.mutate(|inner| match inner.state.set_convention(convention) {
      Some(convention) => {
        inner.value = convention.branch();
        Ok(true)
      }
      None => Ok(false),
    })?;
    debug!(property = %self.subject_name(), applied, "convention updated");
    Ok(())
  }

  pub(crate) fn unset_convention(&self) -> Result<(), ProviderError> {
    self.set_convention(S::no_value())
  }

  pub(crate) fn disallow_changes(&self) {
    self.inner.lock().state.disallow_changes();
    debug!(property = %self.subject_name(), "changes disallowed");
  }

  pub(crate) fn finalize_value_on_read(&self) {
    self.inner.lock().state.finalize_on_next_get();
  }

  pub(crate) fn implicit_finalize_value(&self) {
    let mut inner = self.inner.lock();
    inner.state.disallow_changes();
    inner.state.finalize_on_next_get();
  }

  pub(crate) fn disallow_unsafe_read(&self) {
    self.inner.lock().state.disallow_unsafe_read();
  }

  pub(crate) fn is_finalized(&self) -> bool {
    self.inner.lock().state.is_finalized()
  }

  /// Resolves and freezes the value now, unless it is already final.
  pub(crate) fn finalize_value(self: &Arc<Self>) -> Result<(), ProviderError> {
    let owner: Arc<dyn EvaluationOwner> = self.clone();
    eval::evaluate(owner, || {
      let (supplier, check_safe) = {
        let inner = self.inner.lock();
        if inner.state.is_finalized() {
          return Ok(());
        }
        (
          inner.value.clone(),
          inner.state.requires_safe_read(ValueConsumer::IgnoreUnsafeRead),
        )
      };
      if check_safe {
        self.check_safe_read(&supplier)?;
      }
      self.finalize_now(supplier, ValueConsumer::IgnoreUnsafeRead)?;
      Ok(())
    })
  }

  fn finalize_now(&self, supplier: S, consumer: ValueConsumer) -> Result<S, ProviderError> {
    let value = supplier
      .calculate_value(consumer)
      .map_err(|err| self.query_failed(err))?;
    let resolved = S::resolved(value);
    {
      let mut inner = self.inner.lock();
      if inner.state.is_finalized() {
        return Ok(inner.value.clone());
      }
      inner.value = resolved.clone();
      inner.state.finalize();
    }
    debug!(property = %self.subject_name(), "finalized property value");
    Ok(resolved)
  }

  fn current_producer(&self, supplier: &S) -> ValueProducer {
    match self.attached_producer.lock().clone() {
      Some(task) => ValueProducer::task(task),
      None => supplier.producer(),
    }
  }

  fn check_safe_read(&self, supplier: &S) -> Result<(), ProviderError> {
    let producer = self.current_producer(supplier);
    if let Some(reason) = self.host.before_read(&producer) {
      let subject = self.subject_name();
      debug!(property = %subject, reason = %reason, "unsafe read refused");
      return Err(ProviderError::UnsafeRead { subject, reason });
    }
    Ok(())
  }

  /// Applies read-time policy and returns the supplier to evaluate.
  pub(crate) fn before_read(&self, consumer: ValueConsumer) -> Result<S, ProviderError> {
    let (supplier, finalize, check_safe) = {
      let inner = self.inner.lock();
      (
        inner.value.clone(),
        inner.state.should_finalize(consumer),
        inner.state.requires_safe_read(consumer),
      )
    };
    if check_safe {
      self.check_safe_read(&supplier)?;
    }
    if finalize {
      return self.finalize_now(supplier, consumer);
    }
    Ok(supplier)
  }

  /// Wraps an error raised while computing from this property's supplier.
  pub(crate) fn wrap<R>(&self, result: Result<R, ProviderError>) -> Result<R, ProviderError> {
    result.map_err(|err| self.query_failed(err))
  }
}

impl<T: Data, S: Supplier<T>> EvaluationOwner for PropertyCore<T, S> {
  fn describe(&self) -> String {
    if let Some(name) = self.display_name() {
      return name.to_string();
    }
    let address = self as *const Self as *const () as usize;
    eval::describe_once(address, "<circular reference>", || {
      format!(
        "{}({}, {})",
        self.kind,
        std::any::type_name::<T>(),
        self.supplier().describe()
      )
    })
  }
}

impl<T: Data, S: Supplier<T>> ProviderInternal<T> for PropertyCore<T, S> {
  fn calculate_presence(&self, consumer: ValueConsumer) -> Result<bool, ProviderError> {
    let supplier = self.before_read(consumer)?;
    self.wrap(supplier.calculate_presence(consumer))
  }

  fn calculate_value(&self, consumer: ValueConsumer) -> Result<Value<T>, ProviderError> {
    let supplier = self.before_read(consumer)?;
    let value = self.wrap(supplier.calculate_value(consumer))?;
    Ok(value.push_when_missing(self.display_name().as_ref()))
  }

  fn calculate_execution_time_value(&self) -> Result<ExecutionTimeValue<T>, ProviderError> {
    let supplier = self.before_read(ValueConsumer::IgnoreUnsafeRead)?;
    self.wrap(supplier.calculate_execution_time_value())
  }

  fn producer(&self) -> ValueProducer {
    let supplier = self.supplier();
    self.current_producer(&supplier)
  }

  fn display_name(&self) -> Option<DisplayName> {
    PropertyCore::display_name(self)
  }

  fn subject(&self) -> String {
    self.subject_name()
  }
}

/// Read and lifecycle methods shared by every property façade.
///
/// Expects the façade to have `core: Arc<PropertyCore<$value, _>>` and
/// `provider: Provider<$value>` fields, and a `set_none` method.
macro_rules! property_api {
  ($value:ty) => {
    /// Returns this property as a provider sharing its state.
    pub fn provider(&self) -> $crate::provider::Provider<$value> {
      self.provider.clone()
    }

    pub fn get(&self) -> Result<$value, $crate::error::ProviderError> {
      self.provider.get()
    }

    pub fn get_or_none(&self) -> Result<Option<$value>, $crate::error::ProviderError> {
      self.provider.get_or_none()
    }

    pub fn get_or_else(&self, default: $value) -> Result<$value, $crate::error::ProviderError> {
      self.provider.get_or_else(default)
    }

    pub fn is_present(&self) -> Result<bool, $crate::error::ProviderError> {
      self.provider.is_present()
    }

    pub fn map<R: $crate::value::Data>(
      &self,
      f: impl Fn($value) -> R + Send + Sync + 'static,
    ) -> $crate::provider::Provider<R> {
      self.provider.map(f)
    }

    pub fn flat_map<R: $crate::value::Data>(
      &self,
      f: impl Fn($value) -> $crate::provider::Provider<R> + Send + Sync + 'static,
    ) -> $crate::provider::Provider<R> {
      self.provider.flat_map(f)
    }

    pub fn filter(
      &self,
      predicate: impl Fn(&$value) -> bool + Send + Sync + 'static,
    ) -> $crate::provider::Provider<$value> {
      self.provider.filter(predicate)
    }

    pub fn or_else(&self, value: $value) -> $crate::provider::Provider<$value> {
      self.provider.or_else(value)
    }

    pub fn zip<U: $crate::value::Data, R: $crate::value::Data>(
      &self,
      other: $crate::provider::Provider<U>,
      combiner: impl Fn($value, U) -> R + Send + Sync + 'static,
    ) -> $crate::provider::Provider<R> {
      self.provider.zip(other, combiner)
    }

    pub fn calculate_value(
      &self,
      consumer: $crate::provider::ValueConsumer,
    ) -> Result<$crate::value::Value<$value>, $crate::error::ProviderError> {
      self.provider.calculate_value(consumer)
    }

    pub fn calculate_execution_time_value(
      &self,
    ) -> Result<$crate::value::ExecutionTimeValue<$value>, $crate::error::ProviderError> {
      self.provider.calculate_execution_time_value()
    }

    pub fn producer(&self) -> $crate::producer::ValueProducer {
      self.provider.producer()
    }

    pub fn display_name(&self) -> Option<$crate::value::DisplayName> {
      self.core.display_name()
    }

    /// Names this property for diagnostics, unless it already has a name.
    pub fn attach_display_name(&self, name: $crate::value::DisplayName) {
      self.core.attach_display_name(name);
    }

    /// Declares that the value of this property is produced by `task`.
    pub fn attach_producer(&self, task: $crate::producer::TaskRef) {
      self.core.attach_producer(task);
    }

    /// Sets the value from a provider.
    pub fn set_provider(
      &self,
      provider: $crate::provider::Provider<$value>,
    ) -> Result<(), $crate::error::ProviderError> {
      self.core.set_supplier($crate::property::Supplier::from_provider(provider))
    }

    pub fn value_provider(
      &self,
      provider: $crate::provider::Provider<$value>,
    ) -> Result<&Self, $crate::error::ProviderError> {
      self.set_provider(provider)?;
      Ok(self)
    }

    /// Uses `provider` as the value whenever none has been set explicitly.
    pub fn convention_provider(
      &self,
      provider: $crate::provider::Provider<$value>,
    ) -> Result<&Self, $crate::error::ProviderError> {
      self
        .core
        .set_convention($crate::property::Supplier::from_provider(provider))?;
      Ok(self)
    }

    /// Discards the explicit value, falling back to the convention.
    pub fn unset(&self) -> Result<&Self, $crate::error::ProviderError> {
      self.core.unset()?;
      Ok(self)
    }

    /// Removes the convention.
    pub fn unset_convention(&self) -> Result<&Self, $crate::error::ProviderError> {
      self.core.unset_convention()?;
      Ok(self)
    }

    /// Restores the value from a recorded execution time value.
    pub fn set_from_state(
      &self,
      state: $crate::value::ExecutionTimeValue<$value>,
    ) -> Result<(), $crate::error::ProviderError> {
      self
        .core
        .set_supplier($crate::property::Supplier::from_execution_time_value(state))
    }

    /// Replaces the value with one derived from the current value.
    ///
    /// Returning `None` clears the value as `set_none` does.
    pub fn replace(
      &self,
      transformation: impl FnOnce(
        $crate::provider::Provider<$value>,
      ) -> Option<$crate::provider::Provider<$value>>,
    ) -> Result<(), $crate::error::ProviderError> {
      let current = $crate::property::Supplier::to_provider(&self.core.supplier());
      match transformation(current) {
        Some(provider) => self.set_provider(provider),
        None => self.set_none(),
      }
    }

    /// Resolves the value now and rejects any later change.
    pub fn finalize_value(&self) -> Result<(), $crate::error::ProviderError> {
      self.core.finalize_value()
    }

    /// Rejects later changes without resolving the value.
    pub fn disallow_changes(&self) {
      self.core.disallow_changes();
    }

    /// Resolves the value the next time it is read.
    pub fn finalize_value_on_read(&self) {
      self.core.finalize_value_on_read();
    }

    /// Rejects later changes and resolves the value the next time it is read.
    pub fn implicit_finalize_value(&self) {
      self.core.implicit_finalize_value();
    }

    /// Requires the host to confirm upstream work is ready before each read, and
    /// resolves the value on the next read.
    pub fn disallow_unsafe_read(&self) {
      self.core.disallow_unsafe_read();
    }

    pub fn is_finalized(&self) -> bool {
      self.core.is_finalized()
    }

    /// Whether the current value was set explicitly rather than taken from the convention.
    pub fn is_explicit(&self) -> bool {
      self.core.is_explicit()
    }
  };
}

pub(crate) use property_api;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::producer::ProducerTask;
  use std::sync::atomic::{AtomicBool, Ordering};

  #[derive(Debug)]
  struct Task {
    done: AtomicBool,
  }

  impl ProducerTask for Task {
    fn path(&self) -> &str {
      ":generate"
    }

    fn has_completed(&self) -> bool {
      self.done.load(Ordering::SeqCst)
    }
  }

  #[test]
  fn detached_host_allows_every_read() {
    let task: TaskRef = Arc::new(Task {
      done: AtomicBool::new(false),
    });
    assert_eq!(DetachedHost.before_read(&ValueProducer::task(task)), None);
  }

  #[test]
  fn completion_host_refuses_until_task_completes() {
    let task = Arc::new(Task {
      done: AtomicBool::new(false),
    });
    let producer = ValueProducer::task(task.clone());
    assert_eq!(
      ProducerCompletionHost.before_read(&producer),
      Some("task ':generate' has not completed yet".to_string())
    );
    task.done.store(true, Ordering::SeqCst);
    assert_eq!(ProducerCompletionHost.before_read(&producer), None);
  }
}
