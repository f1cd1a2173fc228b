//! Finalization lifecycle and read policies of collection properties.

use std::sync::Arc;

use lazyprop_lib::{
  DisplayName, ListProperty, MapProperty, ProducerCompletionHost, PropertyFactory, Provider, ProviderError,
};

use super::common::{FakeTask, counting_provider};

#[test]
fn finalized_collection_stops_evaluating_upstream() {
  let (calls, item) = counting_provider(2);
  let list = ListProperty::<i32>::named("inputs");
  list.add(1).unwrap().add_provider(item).unwrap();

  list.finalize_value().unwrap();
  assert_eq!(calls.get(), 1);
  assert_eq!(list.get().unwrap(), vec![1, 2]);
  assert_eq!(list.get().unwrap(), vec![1, 2]);
  assert_eq!(list.size().unwrap(), 2);
  assert_eq!(calls.get(), 1);
}

#[test]
fn finalize_is_idempotent() {
  let (calls, item) = counting_provider(2);
  let list = ListProperty::<i32>::new();
  list.add_provider(item).unwrap();
  list.finalize_value().unwrap();
  list.finalize_value().unwrap();
  assert!(list.is_finalized());
  assert_eq!(calls.get(), 1);
}

#[test]
fn every_mutation_fails_after_finalize() {
  let list = ListProperty::<i32>::named("inputs");
  list.add(1).unwrap();
  list.finalize_value().unwrap();

  let err = list.add(2).unwrap_err();
  assert!(matches!(err, ProviderError::FinalValue { .. }));
  assert_eq!(
    err.to_string(),
    "the value for property 'inputs' is final and cannot be changed any further"
  );
  assert!(list.append(2).is_err());
  assert!(list.set([3]).is_err());
  assert!(list.set_none().is_err());
  assert!(list.empty().is_err());
  assert!(list.convention([4]).is_err());
  assert!(list.exclude(1).is_err());
  assert_eq!(list.get().unwrap(), vec![1]);
}

#[test]
fn finalizing_a_missing_value_keeps_it_missing() {
  let list = ListProperty::<i32>::named("inputs");
  list.add_provider(Provider::missing()).unwrap();
  list.finalize_value().unwrap();
  assert!(!list.is_present().unwrap());
  assert!(list.get().unwrap_err().is_missing_value());
  assert!(list.add(1).is_err());
}

#[test]
fn disallow_changes_rejects_mutation_but_reads_stay_live() {
  let (calls, item) = counting_provider(5);
  let list = ListProperty::<i32>::named("inputs");
  list.add_provider(item).unwrap();
  list.disallow_changes();

  let err = list.add(1).unwrap_err();
  assert!(matches!(err, ProviderError::ChangesDisallowed { .. }));
  list.get().unwrap();
  list.get().unwrap();
  assert_eq!(calls.get(), 2);
  assert!(!list.is_finalized());
}

#[test]
fn finalize_on_read_freezes_map_at_first_read() {
  let (calls, value) = counting_provider("release".to_string());
  let map = MapProperty::<String, String>::named("profiles");
  map.put_provider("mode".to_string(), value).unwrap();
  map.finalize_value_on_read();

  let keys = map.key_set();
  assert_eq!(map.getting("mode".to_string()).get().unwrap(), "release");
  assert_eq!(keys.get().unwrap().len(), 1);
  assert_eq!(calls.get(), 1);
  assert!(map.put("extra".to_string(), "x".to_string()).is_err());
}

#[test]
fn unsafe_read_waits_for_content_producer() {
  let factory = PropertyFactory::new(Arc::new(ProducerCompletionHost));
  let task = FakeTask::new(":generate");
  let list = factory.list_property::<String>();
  list.attach_display_name(DisplayName::property("sources"));
  list
    .add("main.c".to_string())
    .unwrap()
    .add_all_provider(Provider::produced_by(vec!["gen.c".to_string()], task.clone()))
    .unwrap();
  assert!(list.producer().is_produced_by_task());
  list.disallow_unsafe_read();

  let err = list.get().unwrap_err();
  assert!(matches!(err, ProviderError::UnsafeRead { .. }));
  assert_eq!(
    err.to_string(),
    "cannot query the value of property 'sources' because task ':generate' has not completed yet"
  );
  assert!(!list.is_finalized());

  task.complete();
  assert_eq!(list.get().unwrap(), vec!["main.c".to_string(), "gen.c".to_string()]);
  assert!(list.is_finalized());
}
