//! Map properties: keyed entries, overrides and derived providers.

use indexmap::IndexMap;
use lazyprop_lib::{MapProperty, Property, Provider};

fn pairs(map: IndexMap<String, i32>) -> Vec<(String, i32)> {
  map.into_iter().collect()
}

fn key(name: &str) -> String {
  name.to_string()
}

#[test]
fn later_entries_override_in_place() {
  let map = MapProperty::<String, i32>::named("limits");
  map
    .put(key("cpu"), 1)
    .unwrap()
    .put_all([(key("mem"), 2), (key("cpu"), 4)])
    .unwrap()
    .put_provider(key("disk"), Provider::of(8))
    .unwrap();
  assert_eq!(
    pairs(map.get().unwrap()),
    vec![(key("cpu"), 4), (key("mem"), 2), (key("disk"), 8)]
  );
}

#[test]
fn entry_values_follow_their_providers() {
  let threads = Property::<i32>::named("threads");
  threads.set(2).unwrap();
  let map = MapProperty::<String, i32>::new();
  map.put_provider(key("threads"), threads.provider()).unwrap();
  assert_eq!(map.getting(key("threads")).get().unwrap(), 2);

  threads.set(6).unwrap();
  assert_eq!(map.getting(key("threads")).get().unwrap(), 6);

  threads.set_none().unwrap();
  let err = map.get().unwrap_err();
  assert!(err.is_missing_value());
  assert!(err.to_string().contains("property 'threads'"));
}

#[test]
fn insert_recovers_missing_map() {
  let map = MapProperty::<String, i32>::new();
  map
    .put(key("a"), 1)
    .unwrap()
    .put_provider(key("b"), Provider::missing())
    .unwrap()
    .insert(key("c"), 3)
    .unwrap()
    .put(key("d"), 4)
    .unwrap();
  assert_eq!(pairs(map.get().unwrap()), vec![(key("c"), 3), (key("d"), 4)]);
  let keys: Vec<_> = map.key_set().get().unwrap().into_iter().collect();
  assert_eq!(keys, vec![key("c"), key("d")]);
}

#[test]
fn convention_is_replaced_by_put_and_extended_by_insert() {
  let put = MapProperty::<String, i32>::new();
  put.convention([(key("x"), 0)]).unwrap();
  put.put(key("y"), 1).unwrap();
  assert_eq!(pairs(put.get().unwrap()), vec![(key("y"), 1)]);

  let inserted = MapProperty::<String, i32>::new();
  inserted.convention([(key("x"), 0)]).unwrap();
  inserted.insert(key("y"), 1).unwrap();
  assert_eq!(pairs(inserted.get().unwrap()), vec![(key("x"), 0), (key("y"), 1)]);
}

#[test]
fn empty_discards_entries() {
  let map = MapProperty::<String, i32>::new();
  map.put(key("a"), 1).unwrap();
  map.empty().unwrap();
  assert_eq!(map.size().unwrap(), 0);
  map.insert_all([(key("b"), 2)]).unwrap();
  assert_eq!(pairs(map.get().unwrap()), vec![(key("b"), 2)]);
}

#[test]
fn size_of_missing_map_fails() {
  let map = MapProperty::<String, i32>::named("limits");
  map.set_none().unwrap();
  assert!(map.size().unwrap_err().is_missing_value());
}
