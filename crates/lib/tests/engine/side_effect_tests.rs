//! Side effects run once per consumed value, never during evaluation.

use std::sync::Arc;

use lazyprop_lib::{ListProperty, Property, Provider, SideEffect, ValueConsumer};
use parking_lot::Mutex;

use super::common::recording_side_effect;

#[test]
fn map_runs_upstream_side_effect_once_with_upstream_value() {
  let (seen, effect) = recording_side_effect::<i32>();
  let mapped = Provider::of(2).with_side_effect(effect).map(|v| v * 10);
  assert_eq!(mapped.get().unwrap(), 20);
  assert_eq!(*seen.lock(), vec![2]);
}

#[test]
fn side_effect_runs_after_transform() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let effect_log = log.clone();
  let transform_log = log.clone();
  let provider = Provider::of("src".to_string())
    .with_side_effect(SideEffect::new(move |_: &String| effect_log.lock().push("effect")))
    .map(move |v| {
      transform_log.lock().push("transform");
      v.len()
    });
  assert_eq!(provider.get().unwrap(), 3);
  assert_eq!(*log.lock(), vec!["transform", "effect"]);
}

#[test]
fn evaluation_without_consumption_runs_nothing() {
  let (seen, effect) = recording_side_effect::<i32>();
  let provider = Provider::of(1).with_side_effect(effect).map(|v| v + 1);
  assert!(provider.is_present().unwrap());
  let value = provider.calculate_value(ValueConsumer::IgnoreUnsafeRead).unwrap();
  assert_eq!(value.get_without_side_effect(), Some(&2));
  assert!(provider.calculate_execution_time_value().unwrap().has_fixed_value());
  assert!(seen.lock().is_empty());
}

#[test]
fn each_read_runs_side_effect_once() {
  let (seen, effect) = recording_side_effect::<i32>();
  let provider = Provider::of(4).with_side_effect(effect);
  provider.get().unwrap();
  provider.get_or_none().unwrap();
  provider.get_or_else(0).unwrap();
  assert_eq!(*seen.lock(), vec![4, 4, 4]);
}

#[test]
fn zip_and_flat_map_run_each_upstream_effect_once() {
  let (left_seen, left) = recording_side_effect::<i32>();
  let (right_seen, right) = recording_side_effect::<i32>();
  let zipped = Provider::of(1)
    .with_side_effect(left)
    .zip(Provider::of(2).with_side_effect(right), |a, b| a + b)
    .flat_map(|sum| Provider::of(sum * 100));
  assert_eq!(zipped.get().unwrap(), 300);
  assert_eq!(*left_seen.lock(), vec![1]);
  assert_eq!(*right_seen.lock(), vec![2]);
}

#[test]
fn collection_runs_item_effects_in_order() {
  let (seen, effect) = recording_side_effect::<i32>();
  let list = ListProperty::<i32>::new();
  list
    .add_provider(Provider::of(1).with_side_effect(effect.clone()))
    .unwrap()
    .add(5)
    .unwrap()
    .add_provider(Provider::of(2).with_side_effect(effect))
    .unwrap();

  assert_eq!(list.get().unwrap(), vec![1, 5, 2]);
  assert_eq!(*seen.lock(), vec![1, 2]);
  assert_eq!(list.map(|items| items.len()).get().unwrap(), 3);
  assert_eq!(*seen.lock(), vec![1, 2, 1, 2]);
}

#[test]
fn finalized_value_keeps_side_effect_for_later_reads() {
  let (seen, effect) = recording_side_effect::<i32>();
  let property = Property::<i32>::named("count");
  property.set_provider(Provider::of(3).with_side_effect(effect)).unwrap();
  property.finalize_value().unwrap();
  assert!(seen.lock().is_empty());
  assert_eq!(property.get().unwrap(), 3);
  assert_eq!(*seen.lock(), vec![3]);
}
