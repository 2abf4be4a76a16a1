// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::Scheduler;

static NEXT_DEPENDENCY_ID: AtomicU64 = AtomicU64::new(1);

/// Serialization token for scheduled tasks.
///
/// At most one task holding a given dependency runs at a time, and tasks
/// sharing it start in the order they were queued. Clones refer to the same
/// token. A dependency is bound to the scheduler it was created for.
#[derive(Clone)]
pub struct Dependency {
    inner: Arc<DependencyInner>,
}

struct DependencyInner {
    id: u64,
    scheduler_id: u64,
    locked: AtomicBool,
}

impl Dependency {
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            inner: Arc::new(DependencyInner {
                id: NEXT_DEPENDENCY_ID.fetch_add(1, Ordering::Relaxed),
                scheduler_id: scheduler.id(),
                locked: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub(crate) fn scheduler_id(&self) -> u64 {
        self.inner.scheduler_id
    }

    /// True while a task holding this dependency is submitted or running.
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    pub(crate) fn try_lock(&self) -> bool {
        self.inner
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn unlock(&self) {
        self.inner.locked.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.inner.id)
            .field("locked", &self.is_locked())
            .finish()
    }
}
