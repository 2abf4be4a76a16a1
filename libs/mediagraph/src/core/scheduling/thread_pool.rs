// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::cell::Cell;
use std::collections::BinaryHeap;
use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::error::Result;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static WORKER_INDEX: Cell<Option<usize>> = const { Cell::new(None) };
}

struct QueuedJob {
    priority: i32,
    seq: u64,
    job: Job,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Max-heap: higher priority first, then lower sequence number.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct PoolQueue {
    jobs: BinaryHeap<QueuedJob>,
    active: usize,
    next_seq: u64,
    shutdown: bool,
}

struct PoolShared {
    name: String,
    queue: Mutex<PoolQueue>,
    job_available: Condvar,
    idle: Condvar,
}

/// Fixed-size pool of worker threads consuming a priority queue.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    max_threads: usize,
}

impl ThreadPool {
    pub fn new(max_threads: usize) -> Result<Self> {
        Self::with_name("mediagraph-worker", max_threads)
    }

    pub fn with_name(name: &str, max_threads: usize) -> Result<Self> {
        let max_threads = max_threads.max(1);
        let shared = Arc::new(PoolShared {
            name: name.to_string(),
            queue: Mutex::new(PoolQueue::default()),
            job_available: Condvar::new(),
            idle: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(max_threads);
        for index in 0..max_threads {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || worker_loop(shared, index))?;
            workers.push(handle);
        }

        tracing::debug!("[{}] Thread pool started with {} workers", name, max_threads);

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            max_threads,
        })
    }

    /// Index of the pool worker running the current thread, if any.
    pub fn current_worker_index() -> Option<usize> {
        WORKER_INDEX.with(|index| index.get())
    }

    pub fn max_thread_count(&self) -> usize {
        self.max_threads
    }

    /// Queues `job`. Hands the job back when the pool has been shut down.
    pub fn start(&self, job: Job, priority: i32) -> std::result::Result<(), Job> {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            return Err(job);
        }

        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.jobs.push(QueuedJob { priority, seq, job });
        drop(queue);

        self.shared.job_available.notify_one();
        Ok(())
    }

    pub fn active_thread_count(&self) -> usize {
        self.shared.queue.lock().active
    }

    pub fn queued_count(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.lock().shutdown
    }

    /// Blocks until no job is queued or running.
    pub fn wait_for_done(&self) {
        let mut queue = self.shared.queue.lock();
        while queue.active > 0 || !queue.jobs.is_empty() {
            self.shared.idle.wait(&mut queue);
        }
    }

    /// Like [`wait_for_done`](Self::wait_for_done) with a deadline. Returns
    /// `false` on timeout.
    pub fn wait_for_done_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        while queue.active > 0 || !queue.jobs.is_empty() {
            if self.shared.idle.wait_until(&mut queue, deadline).timed_out() {
                return queue.active == 0 && queue.jobs.is_empty();
            }
        }
        true
    }

    /// Stops accepting jobs, lets the workers drain what is queued, and joins
    /// them. A worker calling this is detached rather than joined.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return;
            }
            queue.shutdown = true;
        }
        self.shared.job_available.notify_all();

        let current = std::thread::current().id();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("[{}] Worker thread exited abnormally", self.shared.name);
            }
        }

        tracing::debug!("[{}] Thread pool shut down", self.shared.name);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<PoolShared>, index: usize) {
    WORKER_INDEX.with(|slot| slot.set(Some(index)));
    tracing::trace!("[{}-{}] Worker started", shared.name, index);

    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(queued) = queue.jobs.pop() {
                    queue.active += 1;
                    break queued.job;
                }
                if queue.shutdown {
                    tracing::trace!("[{}-{}] Worker exiting", shared.name, index);
                    return;
                }
                shared.job_available.wait(&mut queue);
            }
        };

        if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
            tracing::error!(
                "[{}-{}] Task panicked: {}",
                shared.name,
                index,
                panic_message(panic.as_ref())
            );
        }

        let mut queue = shared.queue.lock();
        queue.active -= 1;
        if queue.active == 0 && queue.jobs.is_empty() {
            shared.idle.notify_all();
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn test_runs_jobs() {
        let pool = ThreadPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            assert!(pool
                .start(
                    Box::new(move || {
                        counter.fetch_add(1, AtomicOrdering::SeqCst);
                    }),
                    0
                )
                .is_ok());
        }
        pool.wait_for_done();
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 50);
        assert_eq!(pool.active_thread_count(), 0);
    }

    #[test]
    fn test_priority_order_on_single_worker() {
        let pool = ThreadPool::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new((Mutex::new(false), Condvar::new()));

        // Block the only worker so the rest queue up.
        {
            let gate = Arc::clone(&gate);
            assert!(pool
                .start(
                    Box::new(move || {
                        let (lock, cond) = &*gate;
                        let mut open = lock.lock();
                        while !*open {
                            cond.wait(&mut open);
                        }
                    }),
                    0
                )
                .is_ok());
        }
        while pool.active_thread_count() == 0 {
            std::thread::yield_now();
        }

        for (label, priority) in [("low", -10), ("high-a", 10), ("normal", 0), ("high-b", 10)] {
            let order = Arc::clone(&order);
            assert!(pool
                .start(Box::new(move || order.lock().push(label)), priority)
                .is_ok());
        }

        {
            let (lock, cond) = &*gate;
            *lock.lock() = true;
            cond.notify_all();
        }
        pool.wait_for_done();

        assert_eq!(*order.lock(), vec!["high-a", "high-b", "normal", "low"]);
    }

    #[test]
    fn test_shutdown_hands_back_jobs() {
        let pool = ThreadPool::new(1).unwrap();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert!(pool.start(Box::new(|| {}), 0).is_err());
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let pool = ThreadPool::new(1).unwrap();
        assert!(pool.start(Box::new(|| panic!("boom")), 0).is_ok());
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        assert!(pool
            .start(
                Box::new(move || {
                    r.fetch_add(1, AtomicOrdering::SeqCst);
                }),
                0
            )
            .is_ok());
        assert!(pool.wait_for_done_timeout(Duration::from_secs(5)));
        assert_eq!(ran.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_worker_index() {
        assert_eq!(ThreadPool::current_worker_index(), None);
        let pool = ThreadPool::new(1).unwrap();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        assert!(pool
            .start(Box::new(move || *s.lock() = ThreadPool::current_worker_index()), 0)
            .is_ok());
        pool.wait_for_done();
        assert_eq!(*seen.lock(), Some(0));
    }
}
