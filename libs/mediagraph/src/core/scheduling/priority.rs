// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Task priority levels
//!
//! Priorities order work inside the thread pool's queue and inside each
//! dependency's pending queue. Higher values run first; equal values keep
//! submission order.
//!
//! ## Usage Guidelines
//!
//! ### TimeCritical / Highest
//! - Audio output feeding a device callback
//! - Sinks pacing against the wall clock
//!
//! ### High / Normal
//! - Decoding and encoding
//! - Format conversion
//!
//! ### Low / Lowest / Idle
//! - File writing
//! - Trace and statistics dumps

use serde::{Deserialize, Serialize};

/// Priority of a scheduled task.
///
/// Use `as i32` (or `i32::from`) where a raw priority is expected; the
/// scheduler also accepts any other `i32` for finer ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TaskPriority {
    Idle = -1000,
    Lowest = -100,
    Low = -10,
    Normal = 0,
    High = 10,
    Highest = 100,
    TimeCritical = 1000,
}

impl TaskPriority {
    pub const fn value(self) -> i32 {
        self as i32
    }

    /// Short label for logs.
    pub fn label(self) -> &'static str {
        match self {
            TaskPriority::Idle => "idle",
            TaskPriority::Lowest => "lowest",
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Highest => "highest",
            TaskPriority::TimeCritical => "time-critical",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl From<TaskPriority> for i32 {
    fn from(priority: TaskPriority) -> Self {
        priority.value()
    }
}
