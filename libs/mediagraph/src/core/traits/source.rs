// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! SourceNode - buffer producers polled by the graph
//!
//! Sources sit at the start of a pipeline: file readers, capture devices,
//! network receivers, test generators. They have no inputs; the graph's
//! production loop calls [`SourceNode::process`] repeatedly on its own thread
//! and the source emits whatever it produced on its output ports.
//!
//! Only the graph thread ever calls `process()` on a given source, so sources
//! take `&mut self` and need no internal locking for their own state.

use crate::core::error::Result;

pub trait SourceNode: Send {
    /// Opens the underlying device or file.
    fn start(&mut self) -> Result<()>;

    /// Closes the source. May be called without a prior successful start.
    fn stop(&mut self);

    /// Produces at most a small batch of buffers. Returns `true` if anything
    /// was emitted; `false` makes the graph back off briefly.
    fn process(&mut self) -> bool;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<S: SourceNode + ?Sized> SourceNode for Box<S> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn process(&mut self) -> bool {
        (**self).process()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
