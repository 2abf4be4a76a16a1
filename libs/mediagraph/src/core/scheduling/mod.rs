// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod dependency;
mod priority;
#[allow(clippy::module_inception)]
mod scheduler;
mod thread_pool;
mod trace;

pub use dependency::Dependency;
pub use priority::TaskPriority;
pub use scheduler::Scheduler;
pub use thread_pool::{Job, ThreadPool};
pub use trace::TraceEvent;
