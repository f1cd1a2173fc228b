//! Per-thread evaluation tracking and cycle detection.
//!
//! Every provider evaluation runs inside a scope that records the provider as
//! "being evaluated" on the current thread. Entering a provider that is already
//! on the stack is a cycle, reported as [`ProviderError::CircularEvaluation`].
//!
//! [`EvaluationContext::nested`] opens a fresh frame so that diagnostic work
//! (rendering a cycle, describing a provider) can evaluate providers without
//! tripping over the frame that is reporting the problem.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::ProviderError;

/// Something that can be on the evaluation stack.
pub trait EvaluationOwner: Send + Sync {
  /// Human readable description, used when rendering cycles.
  fn describe(&self) -> String;

  fn type_name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }
}

type Owner = Arc<dyn EvaluationOwner>;

thread_local! {
  static CURRENT: EvaluationContext = EvaluationContext::new();
}

#[derive(Default)]
struct Frames {
  base: Vec<Owner>,
  nested: Vec<Vec<Owner>>,
  describing: Vec<usize>,
}

impl Frames {
  fn top(&mut self) -> &mut Vec<Owner> {
    match self.nested.last_mut() {
      Some(frame) => frame,
      None => &mut self.base,
    }
  }
}

/// The evaluation stack of one thread.
#[derive(Default)]
pub struct EvaluationContext {
  frames: RefCell<Frames>,
}

impl EvaluationContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Runs `f` with the context of the current thread.
  pub fn with_current<R>(f: impl FnOnce(&EvaluationContext) -> R) -> R {
    CURRENT.with(f)
  }

  /// Opens a scope; owners entered through it are popped when it is dropped.
  pub fn open_scope(&self) -> EvaluationScope<'_> {
    EvaluationScope {
      context: self,
      pushed: 0,
    }
  }

  /// Evaluates `body` with `owner` on the stack, failing if `owner` is already being evaluated.
  pub fn evaluate<R>(
    &self,
    owner: Owner,
    body: impl FnOnce() -> Result<R, ProviderError>,
  ) -> Result<R, ProviderError> {
    let mut scope = self.open_scope();
    scope.enter(owner)?;
    body()
  }

  /// Like [`evaluate`](Self::evaluate), but returns `fallback` instead of failing on a cycle.
  pub fn try_evaluate<R>(
    &self,
    owner: Owner,
    fallback: R,
    body: impl FnOnce() -> Result<R, ProviderError>,
  ) -> Result<R, ProviderError> {
    let mut scope = self.open_scope();
    if !scope.try_enter(owner) {
      return Ok(fallback);
    }
    body()
  }

  /// Runs `body` in a fresh frame that does not see the owners of enclosing frames.
  pub fn nested<R>(&self, body: impl FnOnce() -> R) -> R {
    self.frames.borrow_mut().nested.push(Vec::new());
    let _guard = NestedGuard { context: self };
    body()
  }

  /// Whether `owner` is being evaluated in the current frame.
  pub fn is_evaluating(&self, owner: &Owner) -> bool {
    let mut frames = self.frames.borrow_mut();
    frames.top().iter().any(|o| same_owner(o, owner))
  }

  /// Number of owners in the current frame.
  pub fn depth(&self) -> usize {
    self.frames.borrow_mut().top().len()
  }

  /// Produces a description of the object at `address`, or `fallback` if it
  /// is already being described on this thread.
  pub(crate) fn describe_once(&self, address: usize, fallback: &str, describe: impl FnOnce() -> String) -> String {
    {
      let mut frames = self.frames.borrow_mut();
      if frames.describing.contains(&address) {
        return fallback.to_string();
      }
      frames.describing.push(address);
    }
    let _guard = DescribeGuard { context: self };
    describe()
  }
}

/// Evaluates `body` with `owner` on the current thread's stack.
pub fn evaluate<R>(owner: Owner, body: impl FnOnce() -> Result<R, ProviderError>) -> Result<R, ProviderError> {
  EvaluationContext::with_current(|context| context.evaluate(owner, body))
}

/// Evaluates `body` with `owner` on the current thread's stack, returning `fallback` on a cycle.
pub fn try_evaluate<R>(
  owner: Owner,
  fallback: R,
  body: impl FnOnce() -> Result<R, ProviderError>,
) -> Result<R, ProviderError> {
  EvaluationContext::with_current(|context| context.try_evaluate(owner, fallback, body))
}

/// Runs `body` in a fresh frame of the current thread's context.
pub fn nested<R>(body: impl FnOnce() -> R) -> R {
  EvaluationContext::with_current(|context| context.nested(body))
}

pub(crate) fn describe_once(address: usize, fallback: &str, describe: impl FnOnce() -> String) -> String {
  EvaluationContext::with_current(|context| context.describe_once(address, fallback, describe))
}

fn same_owner(a: &Owner, b: &Owner) -> bool {
  std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Guard for owners entered on the current frame.
pub struct EvaluationScope<'a> {
  context: &'a EvaluationContext,
  pushed: usize,
}

impl EvaluationScope<'_> {
  /// Pushes `owner`, or reports the cycle it would close.
  pub fn enter(&mut self, owner: Owner) -> Result<(), ProviderError> {
    let mut frames = self.context.frames.borrow_mut();
    let frame = frames.top();
    if let Some(index) = frame.iter().position(|o| same_owner(o, &owner)) {
      let mut owners = frame[index..].to_vec();
      owners.push(owner);
      drop(frames);
      debug!(depth = owners.len(), "circular evaluation detected");
      return Err(ProviderError::CircularEvaluation(EvaluationCycle::new(owners)));
    }
    frame.push(owner);
    self.pushed += 1;
    trace!(depth = frame.len(), "entered evaluation scope");
    Ok(())
  }

  /// Pushes `owner` unless that would close a cycle.
  pub fn try_enter(&mut self, owner: Owner) -> bool {
    let mut frames = self.context.frames.borrow_mut();
    let frame = frames.top();
    if frame.iter().any(|o| same_owner(o, &owner)) {
      return false;
    }
    frame.push(owner);
    self.pushed += 1;
    true
  }
}

impl Drop for EvaluationScope<'_> {
  fn drop(&mut self) {
    if self.pushed == 0 {
      return;
    }
    let mut frames = self.context.frames.borrow_mut();
    let frame = frames.top();
    let keep = frame.len().saturating_sub(self.pushed);
    frame.truncate(keep);
  }
}

struct NestedGuard<'a> {
  context: &'a EvaluationContext,
}

impl Drop for NestedGuard<'_> {
  fn drop(&mut self) {
    self.context.frames.borrow_mut().nested.pop();
  }
}

struct DescribeGuard<'a> {
  context: &'a EvaluationContext,
}

impl Drop for DescribeGuard<'_> {
  fn drop(&mut self) {
    self.context.frames.borrow_mut().describing.pop();
  }
}

/// The owners forming a cycle, first and last being the same owner.
#[derive(Clone)]
pub struct EvaluationCycle {
  owners: Vec<Owner>,
}

impl EvaluationCycle {
  fn new(owners: Vec<Owner>) -> Self {
    Self { owners }
  }

  pub fn len(&self) -> usize {
    self.owners.len()
  }

  pub fn is_empty(&self) -> bool {
    self.owners.is_empty()
  }

  pub fn owners(&self) -> &[Owner] {
    &self.owners
  }

  /// Describes each owner in a nested frame. An owner whose description
  /// panics is rendered by its type name.
  pub fn render(&self) -> Vec<String> {
    nested(|| {
      self
        .owners
        .iter()
        .map(|owner| {
          panic::catch_unwind(AssertUnwindSafe(|| owner.describe())).unwrap_or_else(|_| owner.type_name().to_string())
        })
        .collect()
    })
  }
}

impl fmt::Display for EvaluationCycle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.render().join(" -> "))
  }
}

impl fmt::Debug for EvaluationCycle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.render()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Named(&'static str);

  impl EvaluationOwner for Named {
    fn describe(&self) -> String {
      self.0.to_string()
    }
  }

  struct Exploding;

  impl EvaluationOwner for Exploding {
    fn describe(&self) -> String {
      panic!("cannot describe");
    }
  }

  fn owner(name: &'static str) -> Owner {
    Arc::new(Named(name))
  }

  #[test]
  fn reentering_reports_cycle_from_first_occurrence() {
    let context = EvaluationContext::new();
    let outer = owner("outer");
    let a = owner("a");
    let b = owner("b");
    let result = context.evaluate(outer, || {
      context.evaluate(a.clone(), || context.evaluate(b.clone(), || context.evaluate(a.clone(), || Ok(()))))
    });
    let err = result.unwrap_err();
    let cycle = err.cycle().unwrap();
    assert_eq!(cycle.render(), vec!["a", "b", "a"]);
    assert_eq!(err.to_string(), "circular evaluation detected: a -> b -> a");
  }

  #[test]
  fn scope_pops_on_exit() {
    let context = EvaluationContext::new();
    let a = owner("a");
    context.evaluate(a.clone(), || Ok(())).unwrap();
    assert_eq!(context.depth(), 0);
    assert!(context.evaluate(a, || Ok(())).is_ok());
  }

  #[test]
  fn scope_pops_on_error() {
    let context = EvaluationContext::new();
    let a = owner("a");
    let result: Result<(), _> = context.evaluate(a, || Err(ProviderError::ChainAlreadyExtended));
    assert!(result.is_err());
    assert_eq!(context.depth(), 0);
  }

  #[test]
  fn try_evaluate_returns_fallback_on_cycle() {
    let context = EvaluationContext::new();
    let a = owner("a");
    let value = context
      .evaluate(a.clone(), || context.try_evaluate(a.clone(), "fallback", || Ok("body")))
      .unwrap();
    assert_eq!(value, "fallback");
  }

  #[test]
  fn nested_frame_hides_outer_owners() {
    let context = EvaluationContext::new();
    let a = owner("a");
    let value = context
      .evaluate(a.clone(), || {
        assert!(context.is_evaluating(&a));
        context.nested(|| {
          assert!(!context.is_evaluating(&a));
          context.evaluate(a.clone(), || Ok(1))
        })
      })
      .unwrap();
    assert_eq!(value, 1);
  }

  #[test]
  fn render_falls_back_to_type_name_on_panic() {
    let cycle = EvaluationCycle::new(vec![Arc::new(Exploding), owner("ok")]);
    let rendered = cycle.render();
    assert!(rendered[0].ends_with("Exploding"));
    assert_eq!(rendered[1], "ok");
  }

  #[test]
  fn describe_once_guards_reentrance() {
    let context = EvaluationContext::new();
    let text = context.describe_once(1, "<loop>", || {
      let inner = context.describe_once(1, "<loop>", || "inner".to_string());
      format!("outer({inner})")
    });
    assert_eq!(text, "outer(<loop>)");
  }
}
