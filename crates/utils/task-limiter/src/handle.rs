use crate::error::{TaskError, TaskResult};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

/// How a submission ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    /// The task ran and returned a value.
    Completed(T),
    /// The task was removed by [`Limiter::clear_queue`](crate::Limiter::clear_queue)
    /// before it started. Its body never ran.
    Aborted,
}

impl<T> TaskOutcome<T> {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Aborted => None,
        }
    }
}

pub(crate) type OutcomeSender<T> = oneshot::Sender<TaskResult<TaskOutcome<T>>>;

/// Future returned by [`Limiter::submit`](crate::Limiter::submit).
///
/// Dropping the handle does not cancel the task. It still runs when its turn
/// comes and still occupies a slot while running.
#[derive(Debug)]
#[must_use = "the task's outcome is only observable through its handle"]
pub struct TaskHandle<T> {
    id: u64,
    rx: oneshot::Receiver<TaskResult<TaskOutcome<T>>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn channel(id: u64) -> (OutcomeSender<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { id, rx })
    }

    /// Submission order id, also used in log events and [`TaskError::task_id`].
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskResult<TaskOutcome<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(TaskError::dropped(id))))
    }
}
