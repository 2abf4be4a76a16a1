// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::Memory;
use crate::core::time::{Interval, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    /// Duration of one frame; invalid when the rate is unknown.
    pub frame_rate: Interval,
}

impl VideoFormat {
    pub const fn new(width: u32, height: u32, frame_rate: Interval) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoBuffer {
    pub format: VideoFormat,
    pub stream_id: u16,
    pub time_stamp: Time,
    pub memory: Memory,
}

impl VideoBuffer {
    pub fn new(format: VideoFormat, time_stamp: Time) -> Self {
        Self {
            format,
            stream_id: 0,
            time_stamp,
            memory: Memory::default(),
        }
    }

    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_stream_id(mut self, stream_id: u16) -> Self {
        self.stream_id = stream_id;
        self
    }

    /// One frame period, or invalid when the frame rate is unknown.
    pub fn duration(&self) -> Time {
        Time::new(1, self.format.frame_rate)
    }

    pub fn set_time_stamp(&mut self, time_stamp: Time) {
        self.time_stamp = time_stamp;
    }
}
