//! Re-entrant evaluation is reported as a cycle instead of recursing forever.

use lazyprop_lib::{EvaluationContext, ListProperty, Property, Provider, ProviderError};

#[test]
fn map_reading_its_own_property_reports_cycle() {
  let p = Property::<i32>::named("p");
  let handle = p.clone();
  p.set_provider(Provider::of(1).try_map(move |v| Ok(v + handle.get()?))).unwrap();

  let err = p.get().unwrap_err();
  assert!(matches!(err, ProviderError::Query { .. }));
  let cycle = err.cycle().expect("cycle error");
  let rendered = cycle.render();
  assert_eq!(rendered.first().map(String::as_str), Some("property 'p'"));
  assert_eq!(rendered.last().map(String::as_str), Some("property 'p'"));
  assert_eq!(rendered.iter().filter(|owner| owner.as_str() == "property 'p'").count(), 2);
  assert!(err.to_string().starts_with("failed to query the value of property 'p'"));
}

#[test]
fn cycle_through_two_properties_lists_both() {
  let a = Property::<i32>::named("a");
  let b = Property::<i32>::named("b");
  a.set_provider(b.map(|v| v + 1)).unwrap();
  b.set_provider(a.map(|v| v * 2)).unwrap();

  let err = a.get().unwrap_err();
  let rendered = err.cycle().expect("cycle error").render();
  assert_eq!(rendered.first().map(String::as_str), Some("property 'a'"));
  assert_eq!(rendered.last().map(String::as_str), Some("property 'a'"));
  assert!(rendered.iter().any(|owner| owner == "property 'b'"));
}

#[test]
fn collection_depending_on_itself_reports_cycle() {
  let list = ListProperty::<i32>::named("flags");
  list.add(1).unwrap();
  list.add_all_provider(list.provider()).unwrap();
  let err = list.get().unwrap_err();
  assert!(err.cycle().is_some());
}

#[test]
fn stack_is_empty_after_cycle() {
  let p = Property::<i32>::named("p");
  p.set_provider(p.map(|v| v + 1)).unwrap();
  assert!(p.get().is_err());
  assert_eq!(EvaluationContext::with_current(EvaluationContext::depth), 0);

  p.set(3).unwrap();
  assert_eq!(p.get().unwrap(), 3);
}

#[test]
fn concurrent_reads_are_not_reported_as_cycles() {
  let p = Property::<i32>::named("p");
  p.set_provider(Provider::of(20).map(|v| v + 1)).unwrap();
  let readers: Vec<_> = (0..4)
    .map(|_| {
      let p = p.clone();
      std::thread::spawn(move || p.get())
    })
    .collect();
  for reader in readers {
    assert_eq!(reader.join().unwrap().unwrap(), 21);
  }
}
