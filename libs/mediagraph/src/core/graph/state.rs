// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

/// Graph lifecycle: `Idle -> Starting -> Running -> Stopping -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Not started, or fully stopped
    Idle,
    /// Nodes are being started
    Starting,
    /// Production loop is polling sources
    Running,
    /// Draining in-flight tasks before nodes are stopped
    Stopping,
}
