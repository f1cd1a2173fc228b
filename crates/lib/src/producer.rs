//! Tracking of the work that produces a provider's value.
//!
//! A [`ValueProducer`] describes which tasks, if any, must run before a value
//! (or the content behind it) is available. Hosts use it to refuse unsafe
//! reads, and filters use it to refuse evaluating content that is still being
//! produced.

use std::fmt;
use std::sync::Arc;

/// A unit of work that can produce values or content.
pub trait ProducerTask: Send + Sync + fmt::Debug {
  /// Identifying path of the task, used in diagnostics.
  fn path(&self) -> &str;

  /// Whether the task has finished running.
  fn has_completed(&self) -> bool;
}

pub type TaskRef = Arc<dyn ProducerTask>;

/// Describes what produces a value.
#[derive(Clone, Debug, Default)]
pub enum ValueProducer {
  /// Known to have no producer.
  #[default]
  NoProducer,

  /// The producer cannot be determined.
  Unknown,

  /// Produced by a task. `content` is true when the task produces the content
  /// behind the value rather than the value itself.
  Task { task: TaskRef, content: bool },

  /// Produced by both sides.
  Plus(Arc<ValueProducer>, Arc<ValueProducer>),
}

impl ValueProducer {
  /// The value itself is computed by `task`.
  pub fn task(task: TaskRef) -> Self {
    ValueProducer::Task { task, content: false }
  }

  /// The content behind the value is produced by `task`.
  pub fn content(task: TaskRef) -> Self {
    ValueProducer::Task { task, content: true }
  }

  /// Combines two producers, collapsing trivial cases.
  pub fn plus(self, other: ValueProducer) -> ValueProducer {
    if matches!(self, ValueProducer::NoProducer) {
      return other;
    }
    if matches!(other, ValueProducer::NoProducer) || self.same_as(&other) {
      return self;
    }
    ValueProducer::Plus(Arc::new(self), Arc::new(other))
  }

  /// Whether the producer of this value is known.
  pub fn is_known(&self) -> bool {
    match self {
      ValueProducer::NoProducer | ValueProducer::Task { .. } => true,
      ValueProducer::Unknown => false,
      ValueProducer::Plus(left, right) => left.is_known() || right.is_known(),
    }
  }

  pub fn is_produced_by_task(&self) -> bool {
    let mut found = false;
    self.visit_producer_tasks(&mut |_| found = true);
    found
  }

  /// Visits every task that produces this value or its content.
  pub fn visit_producer_tasks(&self, visitor: &mut dyn FnMut(&TaskRef)) {
    match self {
      ValueProducer::Task { task, .. } => visitor(task),
      ValueProducer::Plus(left, right) => {
        left.visit_producer_tasks(visitor);
        right.visit_producer_tasks(visitor);
      }
      ValueProducer::NoProducer | ValueProducer::Unknown => {}
    }
  }

  /// Visits only the tasks that produce content behind the value.
  pub fn visit_content_producer_tasks(&self, visitor: &mut dyn FnMut(&TaskRef)) {
    match self {
      ValueProducer::Task { task, content: true } => visitor(task),
      ValueProducer::Plus(left, right) => {
        left.visit_content_producer_tasks(visitor);
        right.visit_content_producer_tasks(visitor);
      }
      _ => {}
    }
  }

  fn same_as(&self, other: &ValueProducer) -> bool {
    match (self, other) {
      (ValueProducer::Unknown, ValueProducer::Unknown) => true,
      (ValueProducer::Task { task: a, content: x }, ValueProducer::Task { task: b, content: y }) => {
        x == y && Arc::ptr_eq(a, b)
      }
      _ => false,
    }
  }
}

impl FromIterator<ValueProducer> for ValueProducer {
  fn from_iter<I: IntoIterator<Item = ValueProducer>>(iter: I) -> Self {
    iter.into_iter().fold(ValueProducer::NoProducer, ValueProducer::plus)
  }
}
