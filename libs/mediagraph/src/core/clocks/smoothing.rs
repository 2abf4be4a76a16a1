// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Jitter smoothing for timestamps taken from an irregular source.

use crate::core::time::Time;

/// Errors below this are left alone.
const DEADBAND: Time = Time::from_msec(10);

/// Maps jittery input timestamps onto an evenly stepped timeline.
///
/// Every call advances the output by the reference interval (or the running
/// average when none is given). While the input stays within four intervals
/// of the output, the average is blended 7:1 with the observed step and the
/// output is nudged 1/8 of the way toward the input once they are 10 ms or
/// more apart; otherwise the output snaps to the input.
#[derive(Debug, Clone, Default)]
pub struct TimeStampSmoother {
    source_time: Time,
    last_time: Time,
    avg_interval: Time,
}

impl TimeStampSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current estimate of the true sample interval.
    pub fn average_interval(&self) -> Time {
        self.avg_interval
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feeds one raw timestamp and returns the smoothed one.
    pub fn smooth(&mut self, input: Time, ref_interval: Time) -> Time {
        if !input.is_valid() {
            return self.source_time;
        }

        if !self.source_time.is_valid() {
            self.source_time = input;
            self.last_time = input;
            self.avg_interval = if ref_interval.is_valid() {
                ref_interval
            } else {
                Time::NULL
            };
            return self.source_time;
        }

        let step = input - self.last_time;
        let interval = if ref_interval.is_valid() {
            ref_interval
        } else {
            self.avg_interval
        };
        self.source_time += interval;

        let error = input - self.source_time;
        if interval.is_positive() && error.abs() < interval * 4 {
            if error.abs() >= DEADBAND {
                self.source_time += Time::from_usec(error.to_usec() / 8);
            }

            if self.avg_interval.is_positive() {
                self.avg_interval = Time::from_usec(
                    (self.avg_interval.to_usec() * 7 + step.to_usec()) / 8,
                );
            } else {
                self.avg_interval = step;
            }
        } else {
            self.source_time = input;
            if !self.avg_interval.is_positive() {
                self.avg_interval = step;
            }
        }

        self.last_time = input;
        self.source_time
    }
}
