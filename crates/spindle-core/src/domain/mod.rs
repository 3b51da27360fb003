//! Domain model (IDs, task snapshots, pages, filters, replies, errors).
//!
//! Everything here is a plain value: the remote store owns the real task
//! records and this crate only ever holds snapshots of them.

pub mod command;
pub mod errors;
pub mod events;
pub mod filter;
pub mod ids;
pub mod page;
pub mod reply;
pub mod state;
pub mod task;

pub use self::command::CommandType;
pub use self::errors::{StoreError, ValidationError};
pub use self::events::ConsumerEvent;
pub use self::filter::{Filter, FilterOp, page_query, serialize_filters};
pub use self::ids::{QueueId, TaskId};
pub use self::page::{PageReference, TasksPage};
pub use self::reply::Reply;
pub use self::state::{CloseResult, TaskStatus};
pub use self::task::{NewTask, Payload, Task};
