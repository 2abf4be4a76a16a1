// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::graph::{GraphHandle, ObjectId};
use crate::core::scheduling::{Dependency, TaskPriority};

/// Serialized task submission shared by the codec nodes.
pub(super) struct SerialStage {
    handle: GraphHandle,
    owner: ObjectId,
    dependency: Dependency,
    priority: i32,
    started: AtomicBool,
}

impl SerialStage {
    pub(super) fn new(handle: GraphHandle) -> Self {
        let owner = handle.register_object();
        let dependency = handle.new_dependency();
        Self {
            handle,
            owner,
            dependency,
            priority: TaskPriority::Normal.value(),
            started: AtomicBool::new(false),
        }
    }

    pub(super) fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub(super) fn owner(&self) -> ObjectId {
        self.owner
    }

    pub(super) fn set_started(&self, started: bool) -> bool {
        self.started.swap(started, Ordering::AcqRel)
    }

    pub(super) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(super) fn submit(&self, work: impl FnOnce() + Send + 'static) -> bool {
        self.handle
            .schedule(self.owner, Some(&self.dependency), self.priority, work)
    }
}
