use std::hash::Hash;
use std::sync::Arc;

use super::{DetachedHost, Property, PropertyHost};
use crate::collection::{ListProperty, MapProperty, SetProperty};
use crate::value::{Data, DisplayName};

/// Creates properties that share one host.
#[derive(Clone)]
pub struct PropertyFactory {
  host: Arc<dyn PropertyHost>,
}

impl Default for PropertyFactory {
  fn default() -> Self {
    Self::new(Arc::new(DetachedHost))
  }
}

impl PropertyFactory {
  pub fn new(host: Arc<dyn PropertyHost>) -> Self {
    Self { host }
  }

  pub fn host(&self) -> &Arc<dyn PropertyHost> {
    &self.host
  }

  pub fn property<T: Data>(&self) -> Property<T> {
    Property::with_host(self.host.clone())
  }

  /// Creates a property displayed as `property 'name'`.
  pub fn named_property<T: Data>(&self, name: &str) -> Property<T> {
    let property = self.property();
    property.attach_display_name(DisplayName::property(name));
    property
  }

  pub fn list_property<T: Data>(&self) -> ListProperty<T> {
    ListProperty::with_host(self.host.clone())
  }

  pub fn set_property<T: Data + Hash + Eq>(&self) -> SetProperty<T> {
    SetProperty::with_host(self.host.clone())
  }

  pub fn map_property<K: Data + Hash + Eq, V: Data>(&self) -> MapProperty<K, V> {
    MapProperty::with_host(self.host.clone())
  }
}

impl std::fmt::Debug for PropertyFactory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PropertyFactory").finish_non_exhaustive()
  }
}
