//! Persistent, append-once storage for collector chains.
//!
//! A chain is a cons list of immutable links, newest first. Extending a chain
//! allocates one link that points at the old head, so every supplier built
//! from the same prefix shares it. Each head may be extended only once; a
//! second extension would fork the sequence behind the back of the first
//! extension's owner and is rejected.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::Accumulator;
use super::collector::ChainEntry;
use crate::error::ProviderError;

struct Link<A: Accumulator> {
  entry: ChainEntry<A>,
  previous: Option<Arc<Link<A>>>,
  len: usize,
  extended: AtomicBool,
}

impl<A: Accumulator> Drop for Link<A> {
  // Unlink iteratively so dropping a long chain does not recurse once per link.
  fn drop(&mut self) {
    let mut previous = self.previous.take();
    while let Some(link) = previous {
      match Arc::try_unwrap(link) {
        Ok(mut link) => previous = link.previous.take(),
        Err(_) => break,
      }
    }
  }
}

pub(crate) struct CollectorChain<A: Accumulator> {
  head: Arc<Link<A>>,
}

impl<A: Accumulator> Clone for CollectorChain<A> {
  fn clone(&self) -> Self {
    Self {
      head: self.head.clone(),
    }
  }
}

impl<A: Accumulator> CollectorChain<A> {
  pub(crate) fn single(entry: ChainEntry<A>) -> Self {
    Self {
      head: Arc::new(Link {
        entry,
        previous: None,
        len: 1,
        extended: AtomicBool::new(false),
      }),
    }
  }

  /// Builds a chain from entries in oldest to newest order.
  pub(crate) fn from_entries(entries: impl IntoIterator<Item = ChainEntry<A>>) -> Option<Self> {
    let mut chain: Option<Self> = None;
    for entry in entries {
      chain = Some(match chain {
        None => Self::single(entry),
        Some(chain) => chain.link(entry),
      });
    }
    chain
  }

  fn link(&self, entry: ChainEntry<A>) -> Self {
    Self {
      head: Arc::new(Link {
        entry,
        previous: Some(self.head.clone()),
        len: self.head.len + 1,
        extended: AtomicBool::new(false),
      }),
    }
  }

  /// Returns a new chain with `entry` appended. Fails if this head was already extended.
  pub(crate) fn plus(&self, entry: ChainEntry<A>) -> Result<Self, ProviderError> {
    if self.head.extended.swap(true, Ordering::AcqRel) {
      debug!(len = self.head.len, "rejected second extension of collector chain");
      return Err(ProviderError::ChainAlreadyExtended);
    }
    Ok(self.link(entry))
  }

  /// A chain with the same entries whose head has not been extended.
  pub(crate) fn branch(&self) -> Self {
    Self {
      head: Arc::new(Link {
        entry: self.head.entry.clone(),
        previous: self.head.previous.clone(),
        len: self.head.len,
        extended: AtomicBool::new(false),
      }),
    }
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.head.len
  }

  /// Entries in oldest to newest order.
  pub(crate) fn entries(&self) -> Vec<&ChainEntry<A>> {
    let mut entries = Vec::with_capacity(self.head.len);
    let mut link = Some(&self.head);
    while let Some(current) = link {
      entries.push(&current.entry);
      link = current.previous.as_ref();
    }
    entries.reverse();
    entries
  }

  pub(crate) fn describe(&self) -> String {
    let parts: Vec<String> = self.entries().iter().map(|entry| entry.describe()).collect();
    parts.join(" + ")
  }
}
