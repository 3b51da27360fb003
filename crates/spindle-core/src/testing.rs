//! Shared fixtures for unit tests.

use std::sync::Mutex;

use chrono::{TimeZone, Utc};

use crate::domain::{ConsumerEvent, Payload, QueueId, Task, TaskId, TaskStatus};
use crate::ports::EventSink;

/// A version-1 snapshot in queue "test".
pub(crate) fn task(id: &str, status: TaskStatus) -> Task {
    Task {
        id: TaskId::new(id).unwrap(),
        version: 1,
        queue: QueueId::new("test").unwrap(),
        status,
        created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        trigger_date: None,
        attempts: 0,
        payload: Payload::empty(),
    }
}

/// Keeps every event it receives.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<ConsumerEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<ConsumerEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &ConsumerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
