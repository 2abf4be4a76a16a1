// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

#[allow(clippy::module_inception)]
mod graph;
mod handle;
mod state;

pub use graph::Graph;
pub use handle::{GraphHandle, ObjectId};
pub use state::GraphState;
