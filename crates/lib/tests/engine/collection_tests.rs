//! Collector chain folds of list and set properties.

use indexmap::IndexSet;
use lazyprop_lib::{ListProperty, Provider, SetProperty, ValueConsumer};
use proptest::prelude::*;

use super::common::{Counter, recording_side_effect};

// ============================================================================
// Presence
// ============================================================================

#[test]
fn trailing_append_recovers_presence_of_missing_add() {
  let list = ListProperty::<i32>::named("sources");
  list.add_all_provider(Provider::missing()).unwrap().append(7).unwrap();
  assert!(list.is_present().unwrap());
  assert_eq!(list.get().unwrap(), vec![7]);
}

#[test]
fn missing_add_after_append_makes_value_absent() {
  let list = ListProperty::<i32>::named("sources");
  list.append(7).unwrap().add_all_provider(Provider::missing()).unwrap();
  assert!(!list.is_present().unwrap());
  assert!(list.get().unwrap_err().is_missing_value());
}

#[test]
fn fresh_property_has_empty_value() {
  let list = ListProperty::<String>::new();
  assert!(list.is_present().unwrap());
  assert!(list.get().unwrap().is_empty());
}

// ============================================================================
// Poisoning and recovery
// ============================================================================

#[test]
fn missing_add_poisons_earlier_items() {
  let (seen, effect) = recording_side_effect::<i32>();
  let list = ListProperty::<i32>::named("sources");
  list
    .add_provider(Provider::of(1).with_side_effect(effect))
    .unwrap()
    .add_all_provider(Provider::missing())
    .unwrap()
    .add(2)
    .unwrap();

  let value = list.calculate_value(ValueConsumer::IgnoreUnsafeRead).unwrap();
  assert!(value.is_missing());
  assert_eq!(list.get_or_none().unwrap(), None);
  assert!(seen.lock().is_empty());
}

#[test]
fn append_recovers_from_poisoned_prefix() {
  let list = ListProperty::<i32>::new();
  list
    .add(1)
    .unwrap()
    .add_all_provider(Provider::missing())
    .unwrap()
    .append(2)
    .unwrap()
    .add(3)
    .unwrap();
  assert_eq!(list.get().unwrap(), vec![2, 3]);
}

#[test]
fn append_of_missing_provider_recovers_with_nothing() {
  let list = ListProperty::<i32>::new();
  list
    .add(1)
    .unwrap()
    .add_provider(Provider::missing())
    .unwrap()
    .append_provider(Provider::missing())
    .unwrap()
    .add(4)
    .unwrap();
  assert_eq!(list.get().unwrap(), vec![4]);
}

#[test]
fn missing_path_names_the_property() {
  let list = ListProperty::<i32>::named("sources");
  list.add_provider(Provider::missing()).unwrap();
  let err = list.get().unwrap_err();
  assert!(err.to_string().contains("property 'sources'"));
}

// ============================================================================
// Set semantics and mutation
// ============================================================================

#[test]
fn set_keeps_first_insertion_order() {
  let set = SetProperty::<&'static str>::new();
  set
    .add("b")
    .unwrap()
    .add_all(["a", "b", "c"])
    .unwrap()
    .add_all_provider(Provider::of(IndexSet::from(["a", "d"])))
    .unwrap();
  assert_eq!(set.get().unwrap().into_iter().collect::<Vec<_>>(), vec!["b", "a", "c", "d"]);
}

#[test]
fn set_replaces_earlier_additions() {
  let list = ListProperty::<i32>::new();
  list.add(1).unwrap().add(2).unwrap();
  list.set([9]).unwrap();
  list.add(10).unwrap();
  assert_eq!(list.get().unwrap(), vec![9, 10]);
}

#[test]
fn set_none_keeps_later_adds_missing_until_append() {
  let list = ListProperty::<i32>::new();
  list.add(1).unwrap();
  list.set_none().unwrap();
  assert!(!list.is_present().unwrap());
  list.add(2).unwrap();
  assert!(!list.is_present().unwrap());
  list.append(3).unwrap();
  assert_eq!(list.get().unwrap(), vec![3]);
}

#[test]
fn append_builds_on_convention() {
  let list = ListProperty::<&'static str>::new();
  list.convention(["-g"]).unwrap();
  list.append("-O2").unwrap();
  assert!(list.is_explicit());
  assert_eq!(list.get().unwrap(), vec!["-g", "-O2"]);
}

#[test]
fn exclusion_filters_items_added_so_far() {
  let list = ListProperty::<i32>::new();
  list.add_all([1, 2, 3, 4]).unwrap();
  list.exclude_if(|item| item % 2 == 0).unwrap();
  list.add(6).unwrap();
  assert_eq!(list.get().unwrap(), vec![1, 3, 6]);

  list.exclude_provider(Provider::missing()).unwrap();
  assert_eq!(list.get().unwrap(), vec![1, 3, 6]);
}

#[test]
fn providers_are_evaluated_on_each_read() {
  let counter = Counter::new();
  let calls = counter.clone();
  let list = ListProperty::<i32>::new();
  list
    .add_provider(Provider::from_fn(move || {
      calls.bump();
      Some(1)
    }))
    .unwrap();
  assert_eq!(counter.get(), 0);
  list.get().unwrap();
  list.get().unwrap();
  assert_eq!(counter.get(), 2);
}

// ============================================================================
// Fold invariants
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
  Add(i32),
  AddMissing,
  Append(i32),
  AppendMissing,
}

fn op_strategy() -> impl Strategy<Value = Op> {
  prop_oneof![
    (0..100i32).prop_map(Op::Add),
    Just(Op::AddMissing),
    (0..100i32).prop_map(Op::Append),
    Just(Op::AppendMissing),
  ]
}

/// Expected value: a missing `add` discards everything before it until an `append` recovers.
fn expected(ops: &[Op]) -> Option<Vec<i32>> {
  let mut acc = Some(Vec::new());
  for op in ops {
    acc = match (op, acc) {
      (Op::Add(item), Some(mut items)) => {
        items.push(*item);
        Some(items)
      }
      (Op::Add(_), None) => None,
      (Op::AddMissing, _) => None,
      (Op::Append(item), items) => {
        let mut items = items.unwrap_or_default();
        items.push(*item);
        Some(items)
      }
      (Op::AppendMissing, items) => Some(items.unwrap_or_default()),
    };
  }
  acc
}

fn build(ops: &[Op]) -> ListProperty<i32> {
  let list = ListProperty::<i32>::new();
  list.empty().unwrap();
  for op in ops {
    match op {
      Op::Add(item) => list.add(*item).unwrap(),
      Op::AddMissing => list.add_provider(Provider::missing()).unwrap(),
      Op::Append(item) => list.append(*item).unwrap(),
      Op::AppendMissing => list.append_provider(Provider::missing()).unwrap(),
    };
  }
  list
}

proptest! {
  #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

  #[test]
  fn fold_matches_reference_model(ops in prop::collection::vec(op_strategy(), 0..24)) {
    let list = build(&ops);
    let expected = expected(&ops);
    prop_assert_eq!(list.is_present().unwrap(), expected.is_some());
    prop_assert_eq!(list.get_or_none().unwrap(), expected);
  }

  #[test]
  fn execution_time_value_agrees_with_value(ops in prop::collection::vec(op_strategy(), 0..24)) {
    let list = build(&ops);
    let state = list.calculate_execution_time_value().unwrap();
    prop_assert!(!state.is_changing_value());
    prop_assert_eq!(state.fixed_value().cloned(), expected(&ops));
  }
}
