// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Condvar, Mutex};

use super::trace::{TraceEvent, TraceRecorder};
use super::{Dependency, ThreadPool};
use crate::core::clocks::absolute_time_stamp;
use crate::core::error::{Result, StreamError};

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);
static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

struct PendingTask {
    task: Task,
    priority: i32,
}

struct SchedulerInner {
    id: u64,
    pool: Option<Arc<ThreadPool>>,
    queues: Mutex<HashMap<u64, VecDeque<PendingTask>>>,
    task_count: AtomicUsize,
    done_lock: Mutex<()>,
    done: Condvar,
    trace: Mutex<Option<TraceRecorder>>,
}

/// Dependency-aware work queue over a [`ThreadPool`].
///
/// Tasks without a dependency go straight to the pool. Tasks with one run
/// one at a time per dependency, in queue order (priority first, then
/// submission order); each finishing task hands the dependency to the next
/// pending one. Without a usable pool, tasks run inline on the caller.
///
/// Cloning is cheap and yields a handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self::build(Some(pool))
    }

    /// Scheduler that runs every task synchronously on the calling thread.
    pub fn inline() -> Self {
        Self::build(None)
    }

    /// Creates a scheduler with its own pool of `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self> {
        Ok(Self::new(Arc::new(ThreadPool::new(threads)?)))
    }

    /// Process-wide scheduler sized to the available parallelism.
    pub fn global() -> Scheduler {
        GLOBAL
            .get_or_init(|| {
                let threads = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4);
                match ThreadPool::new(threads) {
                    Ok(pool) => Scheduler::new(Arc::new(pool)),
                    Err(e) => {
                        tracing::error!(
                            "Failed to start global thread pool, tasks will run inline: {}",
                            e
                        );
                        Scheduler::inline()
                    }
                }
            })
            .clone()
    }

    fn build(pool: Option<Arc<ThreadPool>>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                id: NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed),
                pool,
                queues: Mutex::new(HashMap::new()),
                task_count: AtomicUsize::new(0),
                done_lock: Mutex::new(()),
                done: Condvar::new(),
                trace: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn pool(&self) -> Option<&Arc<ThreadPool>> {
        self.inner.pool.as_ref()
    }

    pub fn new_dependency(&self) -> Dependency {
        Dependency::new(self)
    }

    /// Tasks scheduled and not yet finished, including queued ones.
    pub fn task_count(&self) -> usize {
        self.inner.task_count.load(Ordering::Acquire)
    }

    /// Schedules `work`, naming it after the closure type.
    pub fn schedule<F>(&self, work: F, dependency: Option<&Dependency>, priority: i32) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_named(std::any::type_name::<F>(), work, dependency, priority)
    }

    pub fn schedule_named<F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        work: F,
        dependency: Option<&Dependency>,
        priority: i32,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(dep) = dependency {
            if dep.scheduler_id() != self.inner.id {
                return Err(StreamError::Scheduler(format!(
                    "dependency {} belongs to another scheduler",
                    dep.id()
                )));
            }
        }

        self.inner.task_count.fetch_add(1, Ordering::AcqRel);
        let mut task = Task {
            name: name.into(),
            work: Some(Box::new(work)),
            dependency: dependency.cloned(),
            holds_lock: false,
            scheduler: Arc::clone(&self.inner),
        };

        let Some(dep) = dependency else {
            self.inner.submit(task, priority);
            return Ok(());
        };

        let mut queues = self.inner.queues.lock();
        let queue_busy = queues.get(&dep.id()).is_some_and(|q| !q.is_empty());
        if !queue_busy && dep.try_lock() {
            drop(queues);
            task.holds_lock = true;
            self.inner.submit(task, priority);
        } else {
            tracing::trace!("Queueing '{}' behind dependency {}", task.name, dep.id());
            let queue = queues.entry(dep.id()).or_default();
            let pos = queue.partition_point(|p| p.priority >= priority);
            queue.insert(pos, PendingTask { task, priority });
        }

        Ok(())
    }

    /// Blocks until every task scheduled here has finished.
    pub fn wait_for_done(&self) {
        let mut guard = self.inner.done_lock.lock();
        while self.inner.task_count.load(Ordering::Acquire) > 0 {
            self.inner.done.wait(&mut guard);
        }
    }

    /// Starts recording executed tasks for an SVG timeline written on
    /// [`stop_trace`](Self::stop_trace).
    pub fn start_trace(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        tracing::info!("Scheduler trace enabled: {}", path.display());
        *self.inner.trace.lock() = Some(TraceRecorder::new(path, absolute_time_stamp()));
    }

    pub fn is_tracing(&self) -> bool {
        self.inner.trace.lock().is_some()
    }

    /// Events recorded so far by the active trace.
    pub fn trace_events(&self) -> Vec<TraceEvent> {
        self.inner
            .trace
            .lock()
            .as_ref()
            .map(|t| t.events().to_vec())
            .unwrap_or_default()
    }

    /// Writes the trace file and stops recording. Returns the written path.
    pub fn stop_trace(&self) -> Result<Option<PathBuf>> {
        let recorder = self.inner.trace.lock().take();
        match recorder {
            Some(recorder) => {
                tracing::debug!("Stopping scheduler trace {}", recorder.path().display());
                recorder.finish().map(Some)
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.inner.id)
            .field("task_count", &self.task_count())
            .field("threads", &self.inner.pool.as_ref().map(|p| p.max_thread_count()))
            .finish()
    }
}

impl SchedulerInner {
    fn submit(&self, task: Task, priority: i32) {
        match &self.pool {
            Some(pool) => {
                if let Err(job) = pool.start(Box::new(move || task.run()), priority) {
                    tracing::debug!("Thread pool unavailable, running task inline");
                    job();
                }
            }
            None => task.run(),
        }
    }

    /// Hands a released dependency to the next task waiting on it.
    fn schedule_next(&self, dependency: &Dependency) {
        let next = {
            let mut queues = self.queues.lock();
            let Some(queue) = queues.get_mut(&dependency.id()) else {
                return;
            };

            let next = if queue.is_empty() || !dependency.try_lock() {
                None
            } else {
                queue.pop_front()
            };
            if queue.is_empty() {
                queues.remove(&dependency.id());
            }
            next
        };

        if let Some(mut pending) = next {
            pending.task.holds_lock = true;
            self.submit(pending.task, pending.priority);
        }
    }

    fn record_trace(&self, name: &str, start: crate::core::time::Time) {
        let end = absolute_time_stamp();
        if let Some(trace) = self.trace.lock().as_mut() {
            trace.record(name, std::thread::current().id(), start, end);
        }
    }

    fn task_finished(&self) {
        let _guard = self.done_lock.lock();
        if self.task_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.notify_all();
        }
    }
}

struct Task {
    name: Cow<'static, str>,
    work: Option<Box<dyn FnOnce() + Send + 'static>>,
    dependency: Option<Dependency>,
    holds_lock: bool,
    scheduler: Arc<SchedulerInner>,
}

impl Task {
    fn run(mut self) {
        let Some(work) = self.work.take() else {
            return;
        };

        tracing::trace!("Running task '{}'", self.name);
        let tracing_enabled = self.scheduler.trace.lock().is_some();
        if tracing_enabled {
            let start = absolute_time_stamp();
            work();
            self.scheduler.record_trace(&self.name, start);
        } else {
            work();
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if self.holds_lock {
            if let Some(dep) = self.dependency.take() {
                dep.unlock();
                self.scheduler.schedule_next(&dep);
            }
        }
        self.scheduler.task_finished();
    }
}
