// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::Memory;
use crate::core::time::{Interval, Time};

/// Interleaved signed 16-bit PCM layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub const fn bytes_per_sample(&self) -> usize {
        self.channels as usize * 2
    }

    pub fn sample_interval(&self) -> Interval {
        Interval::from_frequency(self.sample_rate as i64)
    }
}

#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub format: AudioFormat,
    pub stream_id: u16,
    pub time_stamp: Time,
    pub num_samples: usize,
    pub memory: Memory,
}

impl AudioBuffer {
    /// Silent buffer of `num_samples` samples per channel.
    pub fn new(format: AudioFormat, num_samples: usize, time_stamp: Time) -> Self {
        Self {
            format,
            stream_id: 0,
            time_stamp,
            num_samples,
            memory: Memory::zeroed(num_samples * format.bytes_per_sample()),
        }
    }

    pub fn with_stream_id(mut self, stream_id: u16) -> Self {
        self.stream_id = stream_id;
        self
    }

    /// Playback length at the declared sample rate.
    pub fn duration(&self) -> Time {
        if self.format.sample_rate == 0 {
            return Time::INVALID;
        }
        Time::new(self.num_samples as i64, self.format.sample_interval())
    }

    pub fn set_time_stamp(&mut self, time_stamp: Time) {
        self.time_stamp = time_stamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_follows_sample_rate() {
        let mut buffer = AudioBuffer::new(AudioFormat::new(48000, 2), 1920, Time::NULL);
        assert_eq!(buffer.duration(), Time::from_msec(40));
        assert_eq!(buffer.memory.len(), 1920 * 4);

        buffer.format.sample_rate = 0;
        assert!(!buffer.duration().is_valid());
    }
}
