use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{QueueId, TaskId};
use super::state::TaskStatus;

/// Opaque key-value document attached to a task.
///
/// The consumer never interprets it; business logic and search filters do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(serde_json::Map<String, serde_json::Value>);

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Payload {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// Snapshot of a task as last read from the store.
///
/// Never mutated in place: every store command returns a new snapshot with a
/// higher `version`, and stale snapshots are rejected with a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub version: u64,
    pub queue: QueueId,
    pub status: TaskStatus,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub payload: Payload,
}

/// Input to the store's `create` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub queue: QueueId,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(queue: QueueId, payload: Payload) -> Self {
        Self {
            queue,
            payload,
            trigger_date: None,
        }
    }

    /// Defer the task until `trigger_date`.
    pub fn triggered_at(mut self, trigger_date: DateTime<Utc>) -> Self {
        self.trigger_date = Some(trigger_date);
        self
    }
}
