//! lazyprop-lib: lazily evaluated, composable configuration values
//!
//! This crate provides the building blocks of a deferred-configuration engine:
//! - `Provider`: a read-only lazy value that may be transformed and combined
//! - `Property`: a mutable holder with conventions and a finalization lifecycle
//! - `ListProperty` / `SetProperty` / `MapProperty`: aggregate properties built from collector chains
//! - `Value` / `ExecutionTimeValue`: the value algebra flowing between them
//! - `EvaluationContext`: per-thread cycle detection for provider evaluation

pub mod collection;
pub mod error;
pub mod eval;
pub mod producer;
pub mod property;
pub mod provider;
pub mod value;

pub use collection::{Accumulator, CollectionProperty, ListProperty, MapProperty, SetProperty};
pub use error::ProviderError;
pub use eval::{EvaluationContext, EvaluationCycle, EvaluationOwner};
pub use producer::{ProducerTask, TaskRef, ValueProducer};
pub use property::{DetachedHost, Property, PropertyFactory, PropertyHost, ProducerCompletionHost};
pub use provider::{Provider, ProviderInternal, ValueConsumer};
pub use value::{Data, DisplayName, ExecutionTimeKind, ExecutionTimeValue, Missing, SideEffect, Value};
