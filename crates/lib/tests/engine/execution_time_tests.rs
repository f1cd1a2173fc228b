//! Execution time values of composed providers and properties.

use lazyprop_lib::{ExecutionTimeKind, ListProperty, Property, Provider, ProviderError};

use super::common::{FakeTask, counting_provider};

#[test]
fn fixed_inputs_compose_to_fixed_value() {
  let base = Property::<i32>::named("base");
  base.set(2).unwrap();
  let composed = base
    .map(|v| v * 10)
    .zip(Provider::of(1), |a, b| a + b)
    .filter(|v| *v > 0)
    .or_else(0);

  let state = composed.calculate_execution_time_value().unwrap();
  assert_eq!(state.kind(), ExecutionTimeKind::Fixed);
  assert_eq!(state.fixed_value(), Some(&21));
}

#[test]
fn one_changing_input_makes_composition_changing() {
  let (calls, changing) = counting_provider(5);
  let composed = Provider::of(2)
    .map(|v| v * 10)
    .zip(changing, |a, b| a + b)
    .map(|v| v + 1);

  let state = composed.calculate_execution_time_value().unwrap();
  assert_eq!(state.kind(), ExecutionTimeKind::Changing);
  assert_eq!(calls.get(), 0);

  let provider = state.changing_value().unwrap().clone();
  assert_eq!(provider.get().unwrap(), 26);
  assert_eq!(calls.get(), 1);
}

#[test]
fn changing_content_is_not_reported_as_plain_fixed() {
  let produced = Provider::with_changing_content(vec![1, 2]);
  assert_eq!(
    produced.calculate_execution_time_value().unwrap().kind(),
    ExecutionTimeKind::FixedWithChangingContent
  );
  assert_eq!(
    produced.map(|v| v.len()).calculate_execution_time_value().unwrap().kind(),
    ExecutionTimeKind::Changing
  );
}

#[test]
fn collection_of_fixed_items_is_fixed() {
  let list = ListProperty::<i32>::new();
  list
    .add(1)
    .unwrap()
    .add_provider(Provider::of(2))
    .unwrap()
    .add_all_provider(Provider::of(vec![3, 4]))
    .unwrap();
  let state = list.calculate_execution_time_value().unwrap();
  assert_eq!(state.kind(), ExecutionTimeKind::Fixed);
  assert_eq!(state.fixed_value(), Some(&vec![1, 2, 3, 4]));
}

#[test]
fn collection_with_one_changing_item_is_changing() {
  let (calls, changing) = counting_provider(3);
  let list = ListProperty::<i32>::new();
  list
    .add(1)
    .unwrap()
    .add_provider(changing)
    .unwrap()
    .add_provider(Provider::of(2).map(|v| v * 2))
    .unwrap();

  let state = list.calculate_execution_time_value().unwrap();
  assert!(state.is_changing_value());
  assert_eq!(state.changing_value().unwrap().get().unwrap(), vec![1, 3, 4]);
  assert_eq!(calls.get(), 1);
}

#[test]
fn collection_with_changing_content_keeps_the_flag() {
  let list = ListProperty::<i32>::new();
  list
    .add(1)
    .unwrap()
    .add_all_provider(Provider::with_changing_content(vec![2]))
    .unwrap();
  let state = list.calculate_execution_time_value().unwrap();
  assert_eq!(state.kind(), ExecutionTimeKind::FixedWithChangingContent);
  assert_eq!(state.fixed_value(), Some(&vec![1, 2]));
}

#[test]
fn missing_collection_has_missing_state() {
  let list = ListProperty::<i32>::new();
  list.add(1).unwrap().add_provider(Provider::missing()).unwrap();
  assert!(list.calculate_execution_time_value().unwrap().is_missing());
}

#[test]
fn recorded_state_restores_another_property() {
  let (_, changing) = counting_provider(7);
  let source = ListProperty::<i32>::new();
  source.add(1).unwrap().add_provider(changing).unwrap();

  let restored = ListProperty::<i32>::new();
  restored
    .set_from_state(source.calculate_execution_time_value().unwrap())
    .unwrap();
  assert_eq!(restored.get().unwrap(), vec![1, 7]);

  let fixed = Property::<String>::new();
  fixed.set_from_state(Provider::of("out".to_string()).calculate_execution_time_value().unwrap()).unwrap();
  assert_eq!(fixed.get().unwrap(), "out");
  assert_eq!(
    fixed.calculate_execution_time_value().unwrap().kind(),
    ExecutionTimeKind::Fixed
  );
}

#[test]
fn filter_waits_for_content_producer() {
  let task = FakeTask::new(":generate");
  let filtered = Provider::produced_by(vec![1, 2], task.clone()).filter(|items| !items.is_empty());

  let err = filtered.get().unwrap_err();
  assert!(matches!(err, ProviderError::ContentNotReady { .. }));
  assert!(err.to_string().contains("task ':generate'"));
  assert!(filtered.calculate_execution_time_value().unwrap().is_changing_value());

  task.complete();
  assert_eq!(filtered.get().unwrap(), vec![1, 2]);
  assert!(filtered.calculate_execution_time_value().unwrap().is_changing_value());
}
