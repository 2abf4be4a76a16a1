// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use super::Memory;
use crate::core::time::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
    Subtitle,
}

/// Compressed packet as produced by a demuxer or an encoder.
#[derive(Debug, Clone)]
pub struct EncodedBuffer {
    pub kind: MediaKind,
    pub codec: Arc<str>,
    pub stream_id: u16,
    pub presentation_time_stamp: Time,
    pub decode_time_stamp: Time,
    pub duration: Time,
    pub key_frame: bool,
    pub memory: Memory,
}

impl EncodedBuffer {
    pub fn new(kind: MediaKind, codec: &str, presentation_time_stamp: Time, memory: Memory) -> Self {
        Self {
            kind,
            codec: Arc::from(codec),
            stream_id: 0,
            presentation_time_stamp,
            decode_time_stamp: presentation_time_stamp,
            duration: Time::INVALID,
            key_frame: false,
            memory,
        }
    }
}
