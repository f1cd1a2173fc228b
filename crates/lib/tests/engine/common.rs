//! Shared test helpers for engine integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lazyprop_lib::{ProducerTask, Provider, SideEffect};
use parking_lot::Mutex;

/// Counts how often something ran.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn bump(&self) {
    self.0.fetch_add(1, Ordering::SeqCst);
  }

  pub fn get(&self) -> usize {
    self.0.load(Ordering::SeqCst)
  }
}

/// A provider re-evaluated on each read, counting its evaluations.
pub fn counting_provider<T: lazyprop_lib::Data>(value: T) -> (Counter, Provider<T>) {
  let counter = Counter::new();
  let calls = counter.clone();
  let provider = Provider::from_fn(move || {
    calls.bump();
    Some(value.clone())
  });
  (counter, provider)
}

/// A side effect recording every value it was executed with.
pub fn recording_side_effect<T: lazyprop_lib::Data>() -> (Arc<Mutex<Vec<T>>>, SideEffect<T>) {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = seen.clone();
  let effect = SideEffect::named("record", move |value: &T| sink.lock().push(value.clone()));
  (seen, effect)
}

/// A task whose completion is toggled by the test.
#[derive(Debug)]
pub struct FakeTask {
  path: String,
  done: AtomicBool,
}

impl FakeTask {
  pub fn new(path: &str) -> Arc<Self> {
    Arc::new(Self {
      path: path.to_string(),
      done: AtomicBool::new(false),
    })
  }

  pub fn complete(&self) {
    self.done.store(true, Ordering::SeqCst);
  }
}

impl ProducerTask for FakeTask {
  fn path(&self) -> &str {
    &self.path
  }

  fn has_completed(&self) -> bool {
    self.done.load(Ordering::SeqCst)
  }
}
