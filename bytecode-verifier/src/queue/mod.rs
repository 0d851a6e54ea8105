//! Concurrent processing of a list with results delivered in input order.

mod scheduler;

pub use scheduler::process;

use async_trait::async_trait;
use thiserror::Error;
use tokio::{task::JoinError, time::Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkStatus {
    Processing { started_at: Instant },
    Done { started_at: Instant, ended_at: Instant },
}

#[derive(Clone, Debug)]
pub struct WorkItem<T> {
    pub index: usize,
    pub total_count: usize,
    pub payload: T,
    pub status: WorkStatus,
}

impl<T> WorkItem<T> {
    pub(crate) fn start(index: usize, total_count: usize, payload: T) -> Self {
        Self {
            index,
            total_count,
            payload,
            status: WorkStatus::Processing {
                started_at: Instant::now(),
            },
        }
    }

    pub(crate) fn finish(&mut self) {
        if let WorkStatus::Processing { started_at } = self.status {
            self.status = WorkStatus::Done {
                started_at,
                ended_at: Instant::now(),
            };
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, WorkStatus::Done { .. })
    }

    /// Time spent by the worker; `None` while the item is still processing.
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        match self.status {
            WorkStatus::Processing { .. } => None,
            WorkStatus::Done {
                started_at,
                ended_at,
            } => Some(ended_at - started_at),
        }
    }
}

/// A unit of concurrency. Each worker processes one item at a time and may keep
/// state between items.
#[async_trait]
pub trait Worker<T: Sync>: Send {
    type Output: Send;

    async fn process(&mut self, item: &WorkItem<T>) -> Self::Output;
}

/// Receives the outputs strictly in the order of the input items.
///
/// Returning an error stops admission of new items; the items already
/// dispatched are awaited and their outputs discarded.
#[async_trait]
pub trait ResultHandler<T, O>: Send {
    type Error: Send;

    async fn handle(&mut self, item: WorkItem<T>, output: O) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum QueueError<E> {
    #[error("no workers provided")]
    NoWorkers,
    #[error("result handler failed: {0}")]
    Handler(E),
    #[error("worker task failed: {0}")]
    WorkerPanicked(#[source] JoinError),
}
