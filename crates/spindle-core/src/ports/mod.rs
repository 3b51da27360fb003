//! Ports - abstraction layer.
//!
//! Traits for everything outside this crate: the remote task store (split
//! into a read side and a write side), time, ID generation and event sinks.
//! Implementations live in `impls` (in-memory) or in the embedding process
//! (HTTP clients for a real server).

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod task_query;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink, Notifier};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_query::{TaskQueryService, TaskQueryServiceExt};
pub use self::task_store::TaskStoreService;
