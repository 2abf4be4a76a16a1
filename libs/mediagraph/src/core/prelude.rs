// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Commonly used types for `use mediagraph::prelude::*`.

pub use crate::core::{
    // Errors
    error::{Result, StreamError},

    // Timing
    clocks::Timer,
    time::{Interval, Time},

    // Graph
    graph::{Graph, GraphHandle},
    traits::{Node, SinkNode, SourceNode},

    // Buffers
    frames::{AudioBuffer, MediaBuffer, VideoBuffer},
    ports::OutputPort,

    // Scheduling
    scheduling::{Dependency, Scheduler, TaskPriority},
};
