//! Paging - lazy iteration over server-side pages.
//!
//! # Contract
//! - The first page is fetched on first demand, never at construction.
//! - Page k+1 is fetched only after every task of page k has been handed out.
//! - Only the current page is held in memory.
//! - An empty page that still links to a `next` page is followed; only a
//!   missing `next` ends the sequence.
//! - Not restartable: once exhausted (or failed) it stays exhausted. Build a
//!   fresh iterator to scan again.

mod global;
mod queue;

pub use self::global::{FilteredPages, GlobalIterator};
pub use self::queue::{QueueIterator, QueuePages};

use async_trait::async_trait;
use futures::Stream;

use crate::domain::{PageReference, StoreError, Task, TasksPage};

/// Fetches one page of a listing. `None` asks for the first page.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load_page(&self, page: Option<&PageReference>) -> Result<TasksPage, StoreError>;
}

enum Cursor {
    /// Nothing fetched yet.
    Fresh,
    /// Reading from a loaded page.
    Reading {
        tasks: std::vec::IntoIter<Task>,
        next: Option<PageReference>,
    },
    Exhausted,
}

/// Flattens a chain of pages into a single forward-only sequence of tasks.
pub struct PagedIterator<L> {
    loader: L,
    cursor: Cursor,
    pages_loaded: usize,
}

impl<L: PageLoader> PagedIterator<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cursor: Cursor::Fresh,
            pages_loaded: 0,
        }
    }

    /// Next task, loading the following page only when the current one is
    /// used up.
    ///
    /// A failed page load ends the sequence: the error is returned once and
    /// every later call yields `Ok(None)`.
    pub async fn next(&mut self) -> Result<Option<Task>, StoreError> {
        loop {
            let request = match &mut self.cursor {
                Cursor::Exhausted => return Ok(None),
                Cursor::Fresh => None,
                Cursor::Reading { tasks, next } => {
                    if let Some(task) = tasks.next() {
                        return Ok(Some(task));
                    }
                    match next.take() {
                        Some(reference) => Some(reference),
                        None => {
                            self.cursor = Cursor::Exhausted;
                            return Ok(None);
                        }
                    }
                }
            };

            match self.loader.load_page(request.as_ref()).await {
                Ok(page) => {
                    self.pages_loaded += 1;
                    self.cursor = Cursor::Reading {
                        tasks: page.tasks.into_iter(),
                        next: page.next,
                    };
                }
                Err(err) => {
                    self.cursor = Cursor::Exhausted;
                    return Err(err);
                }
            }
        }
    }

    /// Number of pages fetched so far.
    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.cursor, Cursor::Exhausted)
    }

    /// Drain the remaining tasks. Loads every remaining page.
    pub async fn collect_remaining(mut self) -> Result<Vec<Task>, StoreError> {
        let mut tasks = Vec::new();
        while let Some(task) = self.next().await? {
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// Adapt into a `Stream`; a load error is yielded once, then the stream ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<Task, StoreError>> + Send
    where
        L: 'static,
    {
        futures::stream::unfold(self, |mut iter| async move {
            match iter.next().await {
                Ok(Some(task)) => Some((Ok(task), iter)),
                Ok(None) => None,
                Err(err) => Some((Err(err), iter)),
            }
        })
    }
}
