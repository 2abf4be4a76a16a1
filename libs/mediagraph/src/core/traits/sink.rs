// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! SinkNode - buffer consumers
//!
//! Sinks end a pipeline: audio/video output, file writers, network senders.
//! Each receives the graph's [`Timer`] when started and keeps a
//! [`synced`](Timer::synced) copy to pace presentation against one shared
//! clock.

use crate::core::clocks::Timer;
use crate::core::error::Result;

pub trait SinkNode: Send + Sync {
    fn start(&self, timer: &Timer) -> Result<()>;

    /// May be called without a prior successful start.
    fn stop(&self);

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
