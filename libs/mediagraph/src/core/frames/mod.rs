// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Buffer types moved between nodes.
//!
//! Payloads sit behind [`Memory`], so buffers are cheap to clone and fan out;
//! only timestamps, durations and formats are rewritten by the timing nodes.

mod audio_buffer;
mod data_buffer;
mod encoded_buffer;
mod memory;
mod video_buffer;

pub use audio_buffer::{AudioBuffer, AudioFormat};
pub use data_buffer::{SubpictureBuffer, SubtitleBuffer};
pub use encoded_buffer::{EncodedBuffer, MediaKind};
pub use memory::Memory;
pub use video_buffer::{VideoBuffer, VideoFormat};

use crate::core::time::Time;

/// Any raw buffer, for ports that carry mixed media.
#[derive(Debug, Clone)]
pub enum MediaBuffer {
    Audio(AudioBuffer),
    Video(VideoBuffer),
    Subtitle(SubtitleBuffer),
    Subpicture(SubpictureBuffer),
}

impl MediaBuffer {
    pub fn time_stamp(&self) -> Time {
        match self {
            MediaBuffer::Audio(b) => b.time_stamp,
            MediaBuffer::Video(b) => b.time_stamp,
            MediaBuffer::Subtitle(b) => b.time_stamp,
            MediaBuffer::Subpicture(b) => b.time_stamp,
        }
    }

    pub fn set_time_stamp(&mut self, time_stamp: Time) {
        match self {
            MediaBuffer::Audio(b) => b.time_stamp = time_stamp,
            MediaBuffer::Video(b) => b.time_stamp = time_stamp,
            MediaBuffer::Subtitle(b) => b.time_stamp = time_stamp,
            MediaBuffer::Subpicture(b) => b.time_stamp = time_stamp,
        }
    }

    pub fn duration(&self) -> Time {
        match self {
            MediaBuffer::Audio(b) => b.duration(),
            MediaBuffer::Video(b) => b.duration(),
            MediaBuffer::Subtitle(b) => b.duration,
            MediaBuffer::Subpicture(b) => b.duration,
        }
    }

    pub fn stream_id(&self) -> u16 {
        match self {
            MediaBuffer::Audio(b) => b.stream_id,
            MediaBuffer::Video(b) => b.stream_id,
            MediaBuffer::Subtitle(b) => b.stream_id,
            MediaBuffer::Subpicture(b) => b.stream_id,
        }
    }
}

impl From<AudioBuffer> for MediaBuffer {
    fn from(b: AudioBuffer) -> Self {
        MediaBuffer::Audio(b)
    }
}

impl From<VideoBuffer> for MediaBuffer {
    fn from(b: VideoBuffer) -> Self {
        MediaBuffer::Video(b)
    }
}

impl From<SubtitleBuffer> for MediaBuffer {
    fn from(b: SubtitleBuffer) -> Self {
        MediaBuffer::Subtitle(b)
    }
}

impl From<SubpictureBuffer> for MediaBuffer {
    fn from(b: SubpictureBuffer) -> Self {
        MediaBuffer::Subpicture(b)
    }
}
