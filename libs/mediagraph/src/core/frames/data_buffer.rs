// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::Memory;
use crate::core::time::Time;

/// Timed subtitle text.
#[derive(Debug, Clone)]
pub struct SubtitleBuffer {
    pub stream_id: u16,
    pub time_stamp: Time,
    pub duration: Time,
    pub lines: Vec<String>,
}

impl SubtitleBuffer {
    pub fn new(time_stamp: Time, duration: Time, lines: Vec<String>) -> Self {
        Self {
            stream_id: 0,
            time_stamp,
            duration,
            lines,
        }
    }
}

/// Timed bitmap overlay (DVD/DVB style subpicture).
#[derive(Debug, Clone)]
pub struct SubpictureBuffer {
    pub stream_id: u16,
    pub time_stamp: Time,
    pub duration: Time,
    pub memory: Memory,
}

impl SubpictureBuffer {
    pub fn new(time_stamp: Time, duration: Time, memory: Memory) -> Self {
        Self {
            stream_id: 0,
            time_stamp,
            duration,
            memory,
        }
    }
}
