//! Bounded-concurrency FIFO scheduler.
//!
//! Submissions are queued synchronously. The first admission check after a
//! submission runs as its own spawned task, so on a current-thread runtime a
//! burst of `submit` calls is fully queued before anything is dequeued, and a
//! single `tokio::task::yield_now().await` by the submitter lets the check
//! run. On a multi-thread runtime the check still runs after the submission is
//! queued, but other workers may interleave; admission order stays FIFO.
//! Entries admitted in the same pass each get their own spawned task, so on a
//! multi-thread runtime their bodies may begin in any order even though their
//! slots were granted oldest first.
//!
//! If the runtime shuts down, pending and running entries are released and
//! their handles resolve with [`TaskErrorKind::Dropped`](crate::TaskErrorKind::Dropped).

use crate::{
    capacity::Capacity,
    entry::{QueueEntry, Settled},
    error::{LimitError, LimitResult},
    handle::TaskHandle,
};
use config_loader::limiter::LimiterConfig;
use logger::{Instrument, debug, info, info_span, warn};
use std::{
    collections::VecDeque,
    fmt,
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::runtime::Handle;

/// Point-in-time view of a limiter, read under a single lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSnapshot {
    pub capacity: usize,
    pub active: usize,
    pub pending: usize,
}

/// Runs at most `capacity` submitted tasks at once, in submission order.
///
/// Cloning is cheap and every clone drives the same queue.
#[derive(Clone)]
pub struct Limiter {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    capacity: Capacity,
    runtime: Handle,
    next_id: AtomicU64,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    queue: VecDeque<QueueEntry>,
    active: usize,
    /// A deferred admission check has been spawned and has not run yet.
    admission_scheduled: bool,
}

impl Inner {
    // User code never runs under this lock, so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Limiter {
    /// Create a limiter driven by the current tokio runtime.
    ///
    /// Fails with [`LimitError::InvalidArgument`] when `capacity` is not an
    /// integer >= 1, and with [`LimitError::NoRuntime`] outside a runtime.
    pub fn new<C>(capacity: C) -> LimitResult<Self>
    where
        C: TryInto<Capacity>,
        LimitError: From<C::Error>,
    {
        let capacity = capacity.try_into()?;
        let runtime = Handle::try_current().map_err(LimitError::no_runtime)?;
        Ok(Self::with_runtime(capacity, runtime))
    }

    /// Create a limiter that spawns its work on `runtime`.
    pub fn with_runtime(capacity: Capacity, runtime: Handle) -> Self {
        Self::build("limiter".to_string(), capacity, runtime)
    }

    /// Create a named limiter from configuration, on the current runtime.
    pub fn from_config(config: &LimiterConfig) -> LimitResult<Self> {
        let capacity = Capacity::try_from(config.concurrency)?;
        let runtime = Handle::try_current().map_err(LimitError::no_runtime)?;
        Ok(Self::build(config.name.clone(), capacity, runtime))
    }

    fn build(name: String, capacity: Capacity, runtime: Handle) -> Self {
        debug!(limiter = %name, %capacity, "limiter created");
        Self {
            inner: Arc::new(Inner {
                name,
                capacity,
                runtime,
                next_id: AtomicU64::new(0),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Queue `task` and return a handle to its eventual outcome.
    ///
    /// The task is not invoked here. It starts once every earlier submission
    /// has started and a slot is free. A task that returns `Err`, or panics
    /// while building or polling its future, fails only its own handle.
    ///
    /// Synchronous or infallible work is wrapped in a ready future:
    ///
    /// ```
    /// # use std::convert::Infallible;
    /// # use task_limiter::{Limiter, TaskOutcome};
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let limiter = Limiter::new(2).unwrap();
    ///
    /// let sum = limiter.submit(|| futures::future::ready(Ok::<_, Infallible>(2 + 2)));
    /// let echo = limiter.submit(|| async { Ok::<_, Infallible>("echo") });
    ///
    /// assert_eq!(sum.await.unwrap(), TaskOutcome::Completed(4));
    /// assert_eq!(echo.await.unwrap(), TaskOutcome::Completed("echo"));
    /// # }
    /// ```
    pub fn submit<F, Fut, T, E>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, handle) = TaskHandle::channel(id);
        let entry = QueueEntry::new(id, task, tx);

        let (pending, schedule) = {
            let mut state = self.inner.lock();
            state.queue.push_back(entry);
            let schedule = !state.admission_scheduled;
            state.admission_scheduled = true;
            (state.queue.len(), schedule)
        };

        debug!(limiter = %self.inner.name, task_id = id, pending, "task queued");

        if schedule {
            let tick = AdmissionTick {
                limiter: Some(self.clone()),
            };
            self.inner.runtime.spawn(async move { tick.run() });
        }

        handle
    }

    /// Like [`submit`](Self::submit), passing `args` to the task when it starts.
    pub fn submit_with<F, A, Fut, T, E>(&self, task: F, args: A) -> TaskHandle<T>
    where
        F: FnOnce(A) -> Fut + Send + 'static,
        A: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        self.submit(move || task(args))
    }

    /// Number of tasks currently running.
    pub fn active_count(&self) -> usize {
        self.inner.lock().active
    }

    /// Number of tasks queued and not yet started.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn capacity(&self) -> Capacity {
        self.inner.capacity
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        let state = self.inner.lock();
        LimiterSnapshot {
            capacity: self.inner.capacity.get(),
            active: state.active,
            pending: state.queue.len(),
        }
    }

    /// Abort every task that has not started yet.
    ///
    /// Their handles resolve to [`TaskOutcome::Aborted`](crate::TaskOutcome::Aborted)
    /// and their bodies never run. Running tasks are left alone. Returns the
    /// number of aborted tasks.
    pub fn clear_queue(&self) -> usize {
        let aborted: Vec<QueueEntry> = self.inner.lock().queue.drain(..).collect();
        let count = aborted.len();

        for entry in aborted {
            entry.abort();
        }

        if count > 0 {
            info!(limiter = %self.inner.name, aborted = count, "pending queue cleared");
        }

        count
    }

    fn admission_tick(&self) {
        self.inner.lock().admission_scheduled = false;
        self.admit();
    }

    /// Start queued entries, oldest first, while slots are free.
    fn admit(&self) {
        let capacity = self.inner.capacity.get();
        let started: Vec<QueueEntry> = {
            let mut state = self.inner.lock();
            let mut started = Vec::new();
            while state.active < capacity {
                let Some(entry) = state.queue.pop_front() else {
                    break;
                };
                state.active += 1;
                started.push(entry);
            }
            started
        };

        for entry in started {
            self.start(entry);
        }
    }

    fn start(&self, entry: QueueEntry) {
        let id = entry.id();
        let span = info_span!("limited_task", limiter = %self.inner.name, task_id = id);
        let slot = RunningSlot {
            id,
            limiter: Some(self.clone()),
        };
        let run = entry.run();

        debug!(limiter = %self.inner.name, task_id = id, "task admitted");

        self.inner.runtime.spawn(
            async move {
                let settled = run.await;
                slot.finish(settled);
            }
            .instrument(span),
        );
    }

    /// Drop every pending entry so its handle resolves as dropped.
    fn abandon_queue(&self) {
        let dropped: Vec<QueueEntry> = {
            let mut state = self.inner.lock();
            state.admission_scheduled = false;
            state.queue.drain(..).collect()
        };

        if !dropped.is_empty() {
            warn!(
                limiter = %self.inner.name,
                dropped = dropped.len(),
                "runtime unavailable, pending tasks dropped"
            );
        }
    }

    /// Release the slot, hand over the result, then admit the next entry.
    fn finish(&self, id: u64, settled: Settled) {
        let active = {
            let mut state = self.inner.lock();
            state.active -= 1;
            state.active
        };

        match settled.failure() {
            Some(error) => warn!(task_id = id, active, %error, "task failed"),
            None => debug!(task_id = id, active, "task completed"),
        }

        if !settled.deliver() {
            debug!(task_id = id, "task handle dropped before the task settled");
        }

        self.admit();
    }
}

/// Deferred admission check. Dropped without running only when the runtime is gone.
struct AdmissionTick {
    limiter: Option<Limiter>,
}

impl AdmissionTick {
    fn run(mut self) {
        if let Some(limiter) = self.limiter.take() {
            limiter.admission_tick();
        }
    }
}

impl Drop for AdmissionTick {
    fn drop(&mut self) {
        if let Some(limiter) = self.limiter.take() {
            limiter.abandon_queue();
        }
    }
}

/// A granted slot. Released by `finish`, or on drop if the task never settled.
struct RunningSlot {
    id: u64,
    limiter: Option<Limiter>,
}

impl RunningSlot {
    fn finish(mut self, settled: Settled) {
        if let Some(limiter) = self.limiter.take() {
            limiter.finish(self.id, settled);
        }
    }
}

impl Drop for RunningSlot {
    fn drop(&mut self) {
        let Some(limiter) = self.limiter.take() else {
            return;
        };

        limiter.inner.lock().active -= 1;
        warn!(limiter = %limiter.inner.name, task_id = self.id, "task dropped before it settled");
        limiter.abandon_queue();
    }
}

impl fmt::Debug for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Limiter")
            .field("name", &self.inner.name)
            .field("capacity", &snapshot.capacity)
            .field("active", &snapshot.active)
            .field("pending", &snapshot.pending)
            .finish()
    }
}
