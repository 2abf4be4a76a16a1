// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::Mutex;

use super::stage::SerialStage;
use super::Decoder;
use crate::core::error::Result;
use crate::core::graph::{GraphHandle, ObjectId};
use crate::core::ports::OutputPort;
use crate::core::traits::Node;

pub struct DecoderNode<D: Decoder> {
    stage: SerialStage,
    decoder: Arc<Mutex<D>>,
    output: Arc<OutputPort<D::Output>>,
}

impl<D: Decoder> DecoderNode<D> {
    pub fn new(handle: GraphHandle, decoder: D) -> Self {
        Self {
            stage: SerialStage::new(handle),
            decoder: Arc::new(Mutex::new(decoder)),
            output: Arc::new(OutputPort::new()),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.stage.set_priority(priority);
        self
    }

    pub fn object_id(&self) -> ObjectId {
        self.stage.owner()
    }

    pub fn output(&self) -> &OutputPort<D::Output> {
        &self.output
    }

    /// Queues `packet` for decoding. Dropped when the node is stopped.
    pub fn input(&self, packet: D::Input) {
        if !self.stage.is_started() {
            tracing::trace!("Decoder node stopped, dropping packet");
            return;
        }
        self.submit(Some(packet));
    }

    fn submit(&self, packet: Option<D::Input>) {
        let decoder = Arc::clone(&self.decoder);
        let output = Arc::clone(&self.output);
        self.stage.submit(move || {
            let decoded = decoder.lock().decode(packet);
            for buffer in decoded {
                output.emit(buffer);
            }
        });
    }
}

impl<D: Decoder> Node for DecoderNode<D> {
    fn start(&self) -> Result<()> {
        self.decoder.lock().open()?;
        self.stage.set_started(true);
        Ok(())
    }

    /// Flushes the backend behind any pending packets.
    fn stop(&self) {
        if self.stage.set_started(false) {
            self.submit(None);
        }
    }

    fn name(&self) -> &str {
        std::any::type_name::<D>()
    }
}
