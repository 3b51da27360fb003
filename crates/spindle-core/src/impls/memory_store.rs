//! In-memory task store.
//!
//! Implements both store ports with the same contract a remote task server
//! offers: every applied command bumps the task's version, a stale snapshot or
//! an illegal transition is answered with `StoreError::Conflict`, and listings
//! are paged through opaque references.
//!
//! Page references are keyset cursors (`after:<seq>`), where `seq` is the
//! creation order of the last task on the page. A task whose status changes
//! while a listing is being walked therefore never shifts the following pages.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{
    CloseResult, CommandType, Filter, NewTask, PageReference, QueueId, StoreError, Task, TaskId,
    TaskStatus, TasksPage,
};
use crate::ports::{Clock, IdGenerator, SystemClock, TaskQueryService, TaskStoreService, UlidGenerator};

const DEFAULT_PAGE_SIZE: usize = 20;
const CURSOR_PREFIX: &str = "after:";

/// One applied command, as recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub command: CommandType,
    pub task_id: TaskId,
    pub reason: Option<String>,
    pub close_result: Option<CloseResult>,
    pub trigger_date: Option<DateTime<Utc>>,
}

impl CommandRecord {
    fn new(command: CommandType, task_id: &TaskId) -> Self {
        Self {
            command,
            task_id: task_id.clone(),
            reason: None,
            close_result: None,
            trigger_date: None,
        }
    }
}

#[derive(Default)]
struct StoreState {
    /// Tasks keyed by creation sequence.
    tasks: BTreeMap<u64, Task>,
    index: HashMap<TaskId, u64>,
    next_seq: u64,
    log: Vec<CommandRecord>,
}

impl StoreState {
    /// Waiting tasks whose trigger date has passed become ready.
    fn promote_due(&mut self, now: DateTime<Utc>) {
        for task in self.tasks.values_mut() {
            if task.status.is_waiting() && task.trigger_date.is_none_or(|at| at <= now) {
                task.status = TaskStatus::Ready;
                task.version += 1;
            }
        }
    }

    fn current_mut(&mut self, id: &TaskId) -> Result<&mut Task, StoreError> {
        let seq = self
            .index
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.tasks
            .get_mut(&seq)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Apply `change` if `snapshot` is current and `allowed` accepts the
    /// current status.
    fn apply(
        &mut self,
        record: CommandRecord,
        snapshot: &Task,
        allowed: impl Fn(TaskStatus) -> bool,
        change: impl FnOnce(&mut Task),
    ) -> Result<Task, StoreError> {
        let command = record.command;
        let current = self.current_mut(&snapshot.id)?;
        if current.version != snapshot.version || !allowed(current.status) {
            debug!(
                command = %command,
                task_id = %snapshot.id,
                expected_version = snapshot.version,
                actual_version = current.version,
                status = %current.status,
                "rejecting stale or illegal command"
            );
            return Err(StoreError::conflict(command, &snapshot.id));
        }
        change(current);
        current.version += 1;
        let updated = current.clone();
        self.log.push(record);
        Ok(updated)
    }

    fn page(
        &self,
        page_size: usize,
        page: Option<&PageReference>,
        matches: impl Fn(&Task) -> bool,
    ) -> Result<TasksPage, StoreError> {
        let after = parse_cursor(page)?;

        let mut selected: Vec<(u64, &Task)> = self
            .tasks
            .range(after.saturating_add(1)..)
            .filter(|&(_, task)| matches(task))
            .take(page_size + 1)
            .map(|(seq, task)| (*seq, task))
            .collect();
        let has_more = selected.len() > page_size;
        selected.truncate(page_size);

        let next = match selected.last() {
            Some((seq, _)) if has_more => Some(cursor(*seq)),
            _ => None,
        };

        // The previous page ends right before the first earlier match that
        // does not fit into one page.
        let previous = if after == 0 {
            None
        } else {
            let earlier: Vec<u64> = self
                .tasks
                .range(..=after)
                .rev()
                .filter(|&(_, task)| matches(task))
                .map(|(seq, _)| *seq)
                .take(page_size + 1)
                .collect();
            if earlier.is_empty() {
                None
            } else {
                Some(cursor(earlier.get(page_size).copied().unwrap_or(0)))
            }
        };

        let tasks = selected.into_iter().map(|(_, task)| task.clone()).collect();
        Ok(TasksPage::new(tasks, previous, next))
    }
}

fn cursor(seq: u64) -> PageReference {
    PageReference::new(format!("{CURSOR_PREFIX}{seq}"))
}

fn parse_cursor(page: Option<&PageReference>) -> Result<u64, StoreError> {
    let Some(page) = page else {
        return Ok(0);
    };
    page.as_str()
        .strip_prefix(CURSOR_PREFIX)
        .and_then(|seq| seq.parse().ok())
        .ok_or_else(|| StoreError::InvalidRequest(format!("malformed page reference: {page}")))
}

fn matches_filters(task: &Task, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(&task.payload))
}

/// Task store kept in process memory.
///
/// Used by tests and by the demo CLI; it stands in for the remote server.
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    page_size: usize,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                next_seq: 1,
                ..StoreState::default()
            }),
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Tasks per listing page; at least 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Every applied command, oldest first.
    pub async fn command_log(&self) -> Vec<CommandRecord> {
        self.state.lock().await.log.clone()
    }

    /// Current snapshot of every task, in creation order.
    pub async fn tasks(&self) -> Vec<Task> {
        let mut state = self.state.lock().await;
        state.promote_due(self.clock.now());
        state.tasks.values().cloned().collect()
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueryService for InMemoryTaskStore {
    async fn find(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let mut state = self.state.lock().await;
        state.promote_due(self.clock.now());
        let task = state
            .index
            .get(id)
            .and_then(|seq| state.tasks.get(seq))
            .cloned();
        Ok(task)
    }

    async fn retrieve_queue_page(
        &self,
        queue: &QueueId,
        status: TaskStatus,
        filters: &[Filter],
        page: Option<&PageReference>,
    ) -> Result<TasksPage, StoreError> {
        let mut state = self.state.lock().await;
        state.promote_due(self.clock.now());
        state.page(self.page_size, page, |task| {
            task.queue == *queue && task.status == status && matches_filters(task, filters)
        })
    }

    async fn retrieve_page(
        &self,
        filters: &[Filter],
        page: Option<&PageReference>,
    ) -> Result<TasksPage, StoreError> {
        let mut state = self.state.lock().await;
        state.promote_due(self.clock.now());
        state.page(self.page_size, page, |task| matches_filters(task, filters))
    }
}

#[async_trait]
impl TaskStoreService for InMemoryTaskStore {
    async fn create(&self, new_task: &NewTask) -> Result<Task, StoreError> {
        let now = self.clock.now();
        let deferred = new_task.trigger_date.is_some_and(|at| at > now);
        let command = if new_task.trigger_date.is_some() {
            CommandType::CreateFutureTask
        } else {
            CommandType::CreateTask
        };

        let task = Task {
            id: self.ids.generate_task_id(),
            version: 1,
            queue: new_task.queue.clone(),
            status: if deferred {
                TaskStatus::Waiting
            } else {
                TaskStatus::Ready
            },
            created: now,
            trigger_date: new_task.trigger_date,
            attempts: 0,
            payload: new_task.payload.clone(),
        };

        let mut state = self.state.lock().await;
        if state.index.contains_key(&task.id) {
            return Err(StoreError::conflict(command, &task.id));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.index.insert(task.id.clone(), seq);
        state.tasks.insert(seq, task.clone());
        let mut record = CommandRecord::new(command, &task.id);
        record.trigger_date = task.trigger_date;
        state.log.push(record);

        debug!(task_id = %task.id, queue = %task.queue, status = %task.status, "task created");
        Ok(task)
    }

    async fn start(&self, task: &Task) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        state.promote_due(self.clock.now());
        state.apply(
            CommandRecord::new(CommandType::StartTask, &task.id),
            task,
            TaskStatus::is_ready,
            |t| {
                t.status = TaskStatus::Started;
                t.attempts += 1;
            },
        )
    }

    async fn requeue(&self, task: &Task, reason: Option<String>) -> Result<Task, StoreError> {
        let mut record = CommandRecord::new(CommandType::RequeueTask, &task.id);
        record.reason = reason;
        let mut state = self.state.lock().await;
        state.apply(record, task, TaskStatus::is_started, |t| {
            t.status = TaskStatus::Ready;
            t.trigger_date = None;
        })
    }

    async fn reschedule(
        &self,
        task: &Task,
        trigger_date: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Task, StoreError> {
        let mut record = CommandRecord::new(CommandType::RescheduleTask, &task.id);
        record.reason = reason;
        record.trigger_date = Some(trigger_date);
        let mut state = self.state.lock().await;
        state.apply(record, task, TaskStatus::is_started, |t| {
            t.status = TaskStatus::Waiting;
            t.trigger_date = Some(trigger_date);
        })
    }

    async fn cancel(&self, task: &Task, reason: Option<String>) -> Result<Task, StoreError> {
        let mut record = CommandRecord::new(CommandType::CancelTask, &task.id);
        record.reason = reason;
        let mut state = self.state.lock().await;
        state.apply(record, task, |s| !s.is_terminal(), |t| {
            t.status = TaskStatus::Cancelled;
        })
    }

    async fn close(
        &self,
        task: &Task,
        result: Option<CloseResult>,
        reason: Option<String>,
    ) -> Result<Task, StoreError> {
        let mut record = CommandRecord::new(CommandType::CloseTask, &task.id);
        record.reason = reason;
        record.close_result = result;
        let mut state = self.state.lock().await;
        state.apply(record, task, TaskStatus::is_started, |t| {
            t.status = TaskStatus::Closed;
        })
    }
}
