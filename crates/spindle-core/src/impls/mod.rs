//! Impls - in-process implementations of the ports.
//!
//! A production deployment talks to a remote task server through HTTP
//! implementations of `TaskQueryService` / `TaskStoreService` provided by the
//! embedding application. The in-memory store here backs tests and the demo
//! CLI.

pub mod memory_store;

pub use self::memory_store::{CommandRecord, InMemoryTaskStore};
