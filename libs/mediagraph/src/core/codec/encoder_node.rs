// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::Mutex;

use super::stage::SerialStage;
use super::Encoder;
use crate::core::error::Result;
use crate::core::graph::{GraphHandle, ObjectId};
use crate::core::ports::OutputPort;
use crate::core::traits::Node;

pub struct EncoderNode<E: Encoder> {
    stage: SerialStage,
    encoder: Arc<Mutex<E>>,
    output: Arc<OutputPort<E::Output>>,
}

impl<E: Encoder> EncoderNode<E> {
    pub fn new(handle: GraphHandle, encoder: E) -> Self {
        Self {
            stage: SerialStage::new(handle),
            encoder: Arc::new(Mutex::new(encoder)),
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

    pub fn output(&self) -> &OutputPort<E::Output> {
        &self.output
    }

    pub fn input(&self, buffer: E::Input) {
        if !self.stage.is_started() {
            tracing::trace!("Encoder node stopped, dropping buffer");
            return;
        }
        self.submit(Some(buffer));
    }

    fn submit(&self, buffer: Option<E::Input>) {
        let encoder = Arc::clone(&self.encoder);
        let output = Arc::clone(&self.output);
        self.stage.submit(move || {
            for packet in encoder.lock().encode(buffer) {
                output.emit(packet);
            }
        });
    }
}

impl<E: Encoder> Node for EncoderNode<E> {
    fn start(&self) -> Result<()> {
        self.encoder.lock().open()?;
        self.stage.set_started(true);
        Ok(())
    }

    fn stop(&self) {
        if self.stage.set_started(false) {
            self.submit(None);
        }
    }

    fn name(&self) -> &str {
        std::any::type_name::<E>()
    }
}
