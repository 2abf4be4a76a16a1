// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Codec backend interfaces and the nodes that drive them.
//!
//! Backends are plain synchronous objects. [`DecoderNode`] and
//! [`EncoderNode`] run each call as a graph task under a per-node
//! dependency, so a stream's buffers reach its backend one at a time and in
//! arrival order while different streams decode in parallel.
//!
//! Per-buffer failures are reported as empty output, never as errors.

mod decoder_node;
mod encoder_node;
mod stage;

pub use decoder_node::DecoderNode;
pub use encoder_node::EncoderNode;

use crate::core::error::Result;

pub trait Decoder: Send + 'static {
    type Input: Send + 'static;
    type Output: Clone + Send + 'static;

    /// Prepares the backend. A failure aborts the graph start.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Decodes one packet; `None` flushes buffered output.
    fn decode(&mut self, input: Option<Self::Input>) -> Vec<Self::Output>;
}

pub trait Encoder: Send + 'static {
    type Input: Send + 'static;
    type Output: Clone + Send + 'static;

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Encodes one buffer; `None` flushes buffered packets.
    fn encode(&mut self, input: Option<Self::Input>) -> Vec<Self::Output>;
}
