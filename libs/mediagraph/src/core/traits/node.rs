// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Node - buffer transformers
//!
//! Nodes receive buffers through plain input methods called by upstream
//! ports and emit results on their own output ports. Inputs may arrive from
//! several pool threads at once, so nodes take `&self` and guard their state
//! internally. Heavy work is handed to the graph scheduler through a
//! [`GraphHandle`](crate::core::graph::GraphHandle).

use crate::core::error::Result;

pub trait Node: Send + Sync {
    fn start(&self) -> Result<()>;

    /// May be called without a prior successful start.
    fn stop(&self);

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
