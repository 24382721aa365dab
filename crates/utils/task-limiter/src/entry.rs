use crate::{
    error::{TaskError, TaskResult},
    handle::{OutcomeSender, TaskOutcome},
};
use futures::{FutureExt, future::BoxFuture};
use std::{
    any::Any,
    borrow::Cow,
    future::Future,
    panic::{self, AssertUnwindSafe},
};

/// A submission waiting in the queue.
///
/// Both actions consume the entry, so it is either run once or aborted once.
pub(crate) struct QueueEntry {
    id: u64,
    job: Box<dyn Job>,
}

impl QueueEntry {
    pub(crate) fn new<F, Fut, T, E>(id: u64, task: F, tx: OutcomeSender<T>) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        Self {
            id,
            job: Box::new(PendingTask { id, task, tx }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn run(self) -> BoxFuture<'static, Settled> {
        self.job.run()
    }

    pub(crate) fn abort(self) {
        self.job.abort()
    }
}

/// Result of a finished task, held back until the limiter has released the
/// task's slot.
pub(crate) struct Settled {
    failure: Option<String>,
    deliver: Box<dyn FnOnce() -> bool + Send>,
}

impl Settled {
    pub(crate) fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Hand the result to the task's handle. `false` when the handle is gone.
    pub(crate) fn deliver(self) -> bool {
        (self.deliver)()
    }
}

trait Job: Send {
    fn run(self: Box<Self>) -> BoxFuture<'static, Settled>;

    fn abort(self: Box<Self>);
}

struct PendingTask<F, T> {
    id: u64,
    task: F,
    tx: OutcomeSender<T>,
}

impl<F, Fut, T, E> Job for PendingTask<F, T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    fn run(self: Box<Self>) -> BoxFuture<'static, Settled> {
        let PendingTask { id, task, tx } = *self;

        async move {
            let result = execute(id, task).await;
            let failure = result.as_ref().err().map(|e| e.kind.to_string());

            Settled {
                failure,
                deliver: Box::new(move || tx.send(result.map(TaskOutcome::Completed)).is_ok()),
            }
        }
        .boxed()
    }

    fn abort(self: Box<Self>) {
        let _ = self.tx.send(Ok(TaskOutcome::Aborted));
    }
}

/// Runs the task, turning panics on either side of the future into errors.
async fn execute<F, Fut, T, E>(id: u64, task: F) -> TaskResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let fut = match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(fut) => fut,
        Err(payload) => return Err(TaskError::panic(id, panic_message(payload))),
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TaskError::execution(id, e)),
        Err(payload) => Err(TaskError::panic(id, panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> Cow<'static, str> {
    match payload.downcast::<&'static str>() {
        Ok(message) => Cow::Borrowed(*message),
        Err(payload) => match payload.downcast::<String>() {
            Ok(message) => Cow::Owned(*message),
            Err(_) => Cow::Borrowed("non-string panic payload"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::TaskErrorKind, handle::TaskHandle};
    use std::{
        io,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    };

    #[tokio::test]
    async fn test_run_delivers_value_after_settling() {
        let (tx, handle) = TaskHandle::channel(1);
        let entry = QueueEntry::new(1, || async { Ok::<_, io::Error>(21 * 2) }, tx);
        assert_eq!(entry.id(), 1);

        let settled = entry.run().await;
        assert!(settled.failure().is_none());
        assert!(settled.deliver());

        assert_eq!(handle.await.unwrap(), TaskOutcome::Completed(42));
    }

    #[tokio::test]
    async fn test_abort_never_invokes_task() {
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = invoked.clone();

        let (tx, handle) = TaskHandle::<()>::channel(5);
        let entry = QueueEntry::new(
            5,
            move || {
                flag.store(true, Ordering::SeqCst);
                async { Ok::<_, io::Error>(()) }
            },
            tx,
        );
        entry.abort();

        assert!(handle.await.unwrap().is_aborted());
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sync_panic_becomes_task_error() {
        fn explode() -> std::future::Ready<Result<u8, io::Error>> {
            panic!("exploded before returning a future")
        }

        let (tx, handle) = TaskHandle::channel(3);
        let settled = QueueEntry::new(3, explode, tx).run().await;
        assert!(settled.failure().unwrap().contains("exploded"));
        settled.deliver();

        let err = handle.await.unwrap_err();
        match err.kind {
            TaskErrorKind::Panic { message } => {
                assert_eq!(message, "exploded before returning a future")
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_panic_and_error_become_task_errors() {
        let (tx, handle) = TaskHandle::<u8>::channel(4);
        async fn fail_late() -> Result<u8, io::Error> {
            panic!("{}", String::from("late failure"))
        }

        let entry = QueueEntry::new(4, fail_late, tx);
        entry.run().await.deliver();
        let err = handle.await.unwrap_err();
        assert!(matches!(err.kind, TaskErrorKind::Panic { ref message } if message == "late failure"));

        let (tx, handle) = TaskHandle::<u8>::channel(6);
        let entry = QueueEntry::new(6, || async { Err(io::Error::other("bad input")) }, tx);
        entry.run().await.deliver();
        let err = handle.await.unwrap_err();
        assert_eq!(err.task_id, 6);
        assert!(matches!(err.kind, TaskErrorKind::Execution { .. }));
    }

    #[tokio::test]
    async fn test_deliver_reports_dropped_handle() {
        let (tx, handle) = TaskHandle::channel(8);
        drop(handle);

        let settled = QueueEntry::new(8, || async { Ok::<_, io::Error>(1) }, tx)
            .run()
            .await;
        assert!(!settled.deliver());
    }
}
