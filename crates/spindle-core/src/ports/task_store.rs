//! TaskStore port - state-changing commands against the task store.
//!
//! Every update takes the caller's last-known snapshot. The store compares
//! its version with the current one and either applies the command, returning
//! the new snapshot, or answers with `StoreError::Conflict`. The caller never
//! learns the outcome any other way: a command whose result was lost must be
//! verified by re-reading the task.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CloseResult, NewTask, StoreError, Task};

#[async_trait]
pub trait TaskStoreService: Send + Sync {
    async fn create(&self, task: &NewTask) -> Result<Task, StoreError>;

    /// Claim a ready task. Exactly one of several racing callers succeeds.
    async fn start(&self, task: &Task) -> Result<Task, StoreError>;

    /// Return a started task to `ready`.
    async fn requeue(&self, task: &Task, reason: Option<String>) -> Result<Task, StoreError>;

    /// Park a task as `waiting` until `trigger_date`.
    async fn reschedule(
        &self,
        task: &Task,
        trigger_date: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Task, StoreError>;

    async fn cancel(&self, task: &Task, reason: Option<String>) -> Result<Task, StoreError>;

    async fn close(
        &self,
        task: &Task,
        result: Option<CloseResult>,
        reason: Option<String>,
    ) -> Result<Task, StoreError>;
}
