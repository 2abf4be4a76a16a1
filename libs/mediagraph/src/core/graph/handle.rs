// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::GraphState;
use crate::core::config::GraphConfig;
use crate::core::scheduling::{Dependency, Scheduler};

/// Identifies an object that schedules tasks through a graph.
pub type ObjectId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GraphEvent {
    TaskFinished,
    Stop,
}

pub(crate) struct GraphShared {
    pub(crate) name: String,
    pub(crate) config: GraphConfig,
    pub(crate) scheduler: Scheduler,
    pub(crate) state: Mutex<GraphState>,
    pub(crate) stopping: AtomicBool,
    pub(crate) worker_thread: Mutex<Option<ThreadId>>,
    pub(crate) events_tx: Sender<GraphEvent>,
    in_flight: Mutex<HashMap<ObjectId, usize>>,
    in_flight_total: AtomicUsize,
    priority: AtomicI32,
    next_object_id: AtomicU64,
}

impl GraphShared {
    pub(crate) fn new(
        name: String,
        config: GraphConfig,
        scheduler: Scheduler,
        events_tx: Sender<GraphEvent>,
    ) -> Self {
        let priority = config.priority;
        Self {
            name,
            config,
            scheduler,
            state: Mutex::new(GraphState::Idle),
            stopping: AtomicBool::new(false),
            worker_thread: Mutex::new(None),
            events_tx,
            in_flight: Mutex::new(HashMap::new()),
            in_flight_total: AtomicUsize::new(0),
            priority: AtomicI32::new(priority),
            next_object_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn in_flight_total(&self) -> usize {
        self.in_flight_total.load(Ordering::Acquire)
    }

    /// True while some object has as many tasks in flight as allowed.
    pub(crate) fn admission_full(&self) -> bool {
        let max = self.config.max_tasks_per_object;
        self.in_flight.lock().values().any(|&n| n >= max)
    }

    pub(crate) fn is_worker_thread(&self) -> bool {
        *self.worker_thread.lock() == Some(std::thread::current().id())
    }

    fn admit(&self, owner: ObjectId) {
        *self.in_flight.lock().entry(owner).or_insert(0) += 1;
        self.in_flight_total.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self, owner: ObjectId) {
        {
            let mut in_flight = self.in_flight.lock();
            if let Some(count) = in_flight.get_mut(&owner) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(&owner);
                }
            }
        }
        self.in_flight_total.fetch_sub(1, Ordering::AcqRel);
        let _ = self.events_tx.send(GraphEvent::TaskFinished);
    }
}

/// Releases an admission slot when the task finishes or is discarded.
struct AdmissionGuard {
    shared: Arc<GraphShared>,
    owner: ObjectId,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.shared.release(self.owner);
    }
}

/// Cloneable access to a graph's scheduler for the nodes inside it.
///
/// Work scheduled through the handle counts against the owner's admission
/// quota; the production loop stops polling sources while any owner is at
/// its limit, and waits for the count to reach zero on stop.
#[derive(Clone)]
pub struct GraphHandle {
    shared: Arc<GraphShared>,
}

impl GraphHandle {
    pub(crate) fn new(shared: Arc<GraphShared>) -> Self {
        Self { shared }
    }

    pub fn graph_name(&self) -> &str {
        &self.shared.name
    }

    /// Allocates an id for an object that will schedule tasks.
    pub fn register_object(&self) -> ObjectId {
        self.shared.next_object_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    pub fn new_dependency(&self) -> Dependency {
        self.shared.scheduler.new_dependency()
    }

    pub fn state(&self) -> GraphState {
        *self.shared.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == GraphState::Running
    }

    /// Asks the production loop to wind down without waiting for it.
    pub fn request_stop(&self) {
        self.shared.stopping.store(true, Ordering::Release);
        let _ = self.shared.events_tx.send(GraphEvent::Stop);
    }

    pub fn in_flight(&self, owner: ObjectId) -> usize {
        self.shared.in_flight.lock().get(&owner).copied().unwrap_or(0)
    }

    pub fn in_flight_total(&self) -> usize {
        self.shared.in_flight_total()
    }

    pub fn priority(&self) -> i32 {
        self.shared.priority.load(Ordering::Relaxed)
    }

    /// Base priority added to every task scheduled through this graph.
    pub fn set_priority(&self, priority: i32) {
        self.shared.priority.store(priority, Ordering::Relaxed);
    }

    /// Schedules `work` on behalf of `owner`. Returns `false`, dropping the
    /// work, when the graph is idle or the scheduler rejects it.
    pub fn schedule<F>(
        &self,
        owner: ObjectId,
        dependency: Option<&Dependency>,
        priority: i32,
        work: F,
    ) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.state() == GraphState::Idle {
            tracing::trace!(
                "[{}] Dropping task for object {}: graph is not running",
                self.shared.name,
                owner
            );
            return false;
        }

        self.shared.admit(owner);
        let guard = AdmissionGuard {
            shared: Arc::clone(&self.shared),
            owner,
        };

        let result = self.shared.scheduler.schedule_named(
            std::any::type_name::<F>(),
            move || {
                let _guard = guard;
                work();
            },
            dependency,
            self.priority().saturating_add(priority),
        );

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[{}] Failed to schedule task: {}", self.shared.name, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphHandle")
            .field("graph", &self.shared.name)
            .field("in_flight", &self.in_flight_total())
            .finish()
    }
}
