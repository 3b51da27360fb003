//! Events - what the consumer reports while it works.

use super::ids::{QueueId, TaskId};

/// Activity emitted by the consumer to its event sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// A full pass over the queue finished.
    QueueConsumed(QueueId),

    /// One task was executed and its reply reconciled.
    TaskConsumed(TaskId),
}

impl ConsumerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ConsumerEvent::QueueConsumed(_) => "QueueConsumed",
            ConsumerEvent::TaskConsumed(_) => "TaskConsumed",
        }
    }
}
