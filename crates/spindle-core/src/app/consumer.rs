//! Consumer - one pass over a queue: claim, execute, reconcile.
//!
//! # Flow (per ready task, strictly sequential)
//! 1. `TaskStoreService::start()` claims the task. A conflict means another
//!    consumer got it first: skip, never retry.
//! 2. The consumer function runs on the claimed snapshot. An error or a
//!    panic becomes `Reply::Retry { reason: None }`.
//! 3. The reply is reconciled: re-read the task and, if it is still
//!    `started`, close / requeue / reschedule it. Reconciliation is retried
//!    with a fixed backoff; running out of attempts aborts the cycle.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::retry::{ReconcilePolicy, RetryExhausted, retry_fixed};
use crate::domain::{
    CloseResult, ConsumerEvent, QueueId, Reply, StoreError, Task, TaskId, TaskStatus,
};
use crate::ports::{Clock, EventSink, TaskQueryService, TaskQueryServiceExt, TaskStoreService};

/// Error type consumer functions may return. Any error means "retry".
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Business logic applied to each claimed task.
#[async_trait]
pub trait ConsumerFunction: Send + Sync {
    async fn consume(&self, task: &Task) -> Result<Reply, HandlerError>;
}

/// Adapts an async closure into a `ConsumerFunction`.
pub struct FnConsumer<F>(F);

/// Wrap `f` as a consumer function.
///
/// ```ignore
/// let function = consumer_fn(|task: Task| async move {
///     println!("processing {}", task.id);
///     Ok(Reply::success())
/// });
/// ```
pub fn consumer_fn<F, Fut>(f: F) -> FnConsumer<F>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    FnConsumer(f)
}

#[async_trait]
impl<F, Fut> ConsumerFunction for FnConsumer<F>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    async fn consume(&self, task: &Task) -> Result<Reply, HandlerError> {
        (self.0)(task.clone()).await
    }
}

/// Failures that end a consume cycle early.
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// The reply of a task whose business logic already ran could not be
    /// written back.
    #[error("failed to reconcile task {task_id} after {attempts} attempt(s)")]
    ReconcileExhausted {
        task_id: TaskId,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A page of candidate tasks could not be loaded.
    #[error("failed to list ready tasks")]
    Query(#[source] StoreError),
}

/// What reconciliation did with a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Closed(CloseResult),
    Requeued,
    Rescheduled(DateTime<Utc>),
    /// The task was no longer `started` (or no longer existed); nothing was
    /// written. Carries the status found, if any.
    Untouched(Option<TaskStatus>),
}

/// Counters for one `consume()` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Tasks claimed, executed and written back.
    pub consumed: usize,
    /// Tasks executed whose status had already moved on, so nothing was
    /// written.
    pub untouched: usize,
    /// Candidates that could not be claimed.
    pub skipped: usize,
}

/// Consumes one queue's ready tasks per `consume()` call.
///
/// Built with `ConsumerBuilder`.
pub struct Consumer {
    pub(crate) queue: QueueId,
    pub(crate) function: Arc<dyn ConsumerFunction>,
    pub(crate) query: Arc<dyn TaskQueryService>,
    pub(crate) store: Arc<dyn TaskStoreService>,
    pub(crate) retry_delay: Option<TimeDelta>,
    pub(crate) reconcile: ReconcilePolicy,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: Arc<dyn EventSink>,
}

impl Consumer {
    pub fn queue(&self) -> &QueueId {
        &self.queue
    }

    pub fn retry_delay(&self) -> Option<TimeDelta> {
        self.retry_delay
    }

    pub fn reconcile_policy(&self) -> &ReconcilePolicy {
        &self.reconcile
    }

    /// Run one pass over every ready task of the queue.
    ///
    /// Claim failures only skip the affected task. A page that cannot be
    /// loaded, or a reply that cannot be reconciled, ends the pass with an
    /// error.
    pub async fn consume(&self) -> Result<CycleReport, ConsumeError> {
        let mut tasks = self
            .query
            .find_in_queue(&self.queue, TaskStatus::Ready, Vec::new());
        let mut report = CycleReport::default();

        while let Some(task) = tasks.next().await.map_err(ConsumeError::Query)? {
            let claimed = match self.store.start(&task).await {
                Ok(claimed) => claimed,
                Err(err) if err.is_conflict() => {
                    info!(queue = %self.queue, task_id = %task.id, "task already claimed elsewhere; skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(err) => {
                    error!(queue = %self.queue, task_id = %task.id, error = %err, "failed to claim task; skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.consume_task(&claimed).await? {
                ReconcileOutcome::Untouched(_) => report.untouched += 1,
                _ => report.consumed += 1,
            }
        }

        self.events
            .emit(&ConsumerEvent::QueueConsumed(self.queue.clone()));
        debug!(
            queue = %self.queue,
            consumed = report.consumed,
            untouched = report.untouched,
            skipped = report.skipped,
            pages = tasks.pages_loaded(),
            "queue consumed"
        );
        Ok(report)
    }

    /// Execute and reconcile a task this consumer has already claimed.
    pub async fn consume_task(&self, task: &Task) -> Result<ReconcileOutcome, ConsumeError> {
        let reply = self.invoke(task).await;
        debug!(task_id = %task.id, reply = %reply, "consumer function replied");

        let outcome = self.apply_reply(&task.id, &reply).await?;
        self.events.emit(&ConsumerEvent::TaskConsumed(task.id.clone()));
        Ok(outcome)
    }

    /// Write `reply` back to the store, retrying per the reconcile policy.
    pub async fn apply_reply(
        &self,
        task_id: &TaskId,
        reply: &Reply,
    ) -> Result<ReconcileOutcome, ConsumeError> {
        retry_fixed(&self.reconcile, "reconcile", move || {
            self.reconcile_once(task_id, reply)
        })
        .await
        .map_err(|RetryExhausted { attempts, last_error }| {
            error!(
                task_id = %task_id,
                reply = %reply,
                attempts,
                error = %last_error,
                "giving up on reconciliation"
            );
            ConsumeError::ReconcileExhausted {
                task_id: task_id.clone(),
                attempts,
                source: last_error,
            }
        })
    }

    async fn invoke(&self, task: &Task) -> Reply {
        let result = AssertUnwindSafe(self.function.consume(task))
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                warn!(task_id = %task.id, error = %err, "consumer function failed; task will be retried");
                Reply::retry_unexplained()
            }
            Err(panic) => {
                error!(
                    task_id = %task.id,
                    panic = %panic_message(panic.as_ref()),
                    "consumer function panicked; task will be retried"
                );
                Reply::retry_unexplained()
            }
        }
    }

    async fn reconcile_once(
        &self,
        task_id: &TaskId,
        reply: &Reply,
    ) -> Result<ReconcileOutcome, StoreError> {
        let current = match self.query.find(task_id).await? {
            Some(task) if task.status.is_started() => task,
            Some(task) => {
                info!(task_id = %task_id, status = %task.status, "task is no longer started; leaving it alone");
                return Ok(ReconcileOutcome::Untouched(Some(task.status)));
            }
            None => {
                info!(task_id = %task_id, "task no longer exists; nothing to reconcile");
                return Ok(ReconcileOutcome::Untouched(None));
            }
        };

        let reason = reply.reason().map(str::to_string);
        let outcome = match reply {
            Reply::Success => {
                self.store
                    .close(&current, Some(CloseResult::Success), None)
                    .await?;
                ReconcileOutcome::Closed(CloseResult::Success)
            }
            Reply::Fail { .. } => {
                self.store
                    .close(&current, Some(CloseResult::Failure), reason)
                    .await?;
                ReconcileOutcome::Closed(CloseResult::Failure)
            }
            Reply::Retry { .. } => match self.retry_delay {
                Some(delay) => {
                    let trigger_date = self.clock.now() + delay;
                    self.store.reschedule(&current, trigger_date, reason).await?;
                    ReconcileOutcome::Rescheduled(trigger_date)
                }
                None => {
                    self.store.requeue(&current, reason).await?;
                    ReconcileOutcome::Requeued
                }
            },
        };

        debug!(task_id = %task_id, outcome = ?outcome, "task reconciled");
        Ok(outcome)
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
