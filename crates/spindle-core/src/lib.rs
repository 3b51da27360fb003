//! spindle-core
//!
//! Client-side consumption engine for a remote task queue.
//!
//! # Modules
//! - **domain**: value types (ids, task snapshots, pages, filters, replies, errors, events)
//! - **ports**: abstraction layer (TaskQueryService, TaskStoreService, Clock, IdGenerator, EventSink)
//! - **paging**: lazy page-by-page iteration (PagedIterator, QueueIterator, GlobalIterator)
//! - **app**: the engine (Consumer, Driver, ConsumerBuilder, ConsumerConfig, ActivityHealthCheck)
//! - **impls**: in-memory store for tests and local runs
//!
//! The crate never installs a tracing subscriber; the embedding binary does.

pub mod app;
pub mod domain;
pub mod impls;
pub mod paging;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{
    BuildError, ConsumeError, Consumer, ConsumerBuilder, ConsumerConfig, ConsumerFunction, Driver,
    ReconcilePolicy, ShutdownOutcome, consumer_fn,
};
pub use domain::{Filter, QueueId, Reply, StoreError, Task, TaskId, TaskStatus};
