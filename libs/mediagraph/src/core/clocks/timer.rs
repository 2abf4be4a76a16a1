// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::TimeStampSmoother;
use crate::core::time::Time;

/// Longest single sleep taken by [`Timer::wait_until`].
pub const MAX_SLEEP_SLICE: Duration = Duration::from_millis(250);

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic time since the process-wide epoch (taken on first use).
pub fn absolute_time_stamp() -> Time {
    let epoch = EPOCH.get_or_init(Instant::now);
    Time::from_usec(epoch.elapsed().as_micros() as i64)
}

#[derive(Debug)]
struct TimerState {
    local_offset: Time,
    paused_at: Time,
}

/// Wall-clock relative counter producing [`Time`] values.
///
/// Offset and pause state live behind an `Arc` so several timers can be
/// [`sync`](Timer::sync)ed to one authoritative writer. Smoothing state is
/// per instance.
pub struct Timer {
    state: Arc<RwLock<TimerState>>,
    smoother: TimeStampSmoother,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(TimerState {
                local_offset: Time::NULL,
                paused_at: Time::INVALID,
            })),
            smoother: TimeStampSmoother::new(),
        }
    }

    /// A new timer sharing this timer's offset and pause state.
    pub fn synced(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            smoother: TimeStampSmoother::new(),
        }
    }

    /// Makes this timer share `other`'s offset and pause state.
    pub fn sync(&mut self, other: &Timer) {
        self.state = Arc::clone(&other.state);
    }

    pub fn is_synced_with(&self, other: &Timer) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn absolute_time_stamp(&self) -> Time {
        absolute_time_stamp()
    }

    pub fn time_stamp(&self) -> Time {
        let state = self.state.read();
        if state.paused_at.is_valid() {
            state.paused_at
        } else {
            absolute_time_stamp() + state.local_offset
        }
    }

    pub fn set_time_stamp(&self, time_stamp: Time) {
        let mut state = self.state.write();
        state.local_offset = time_stamp - absolute_time_stamp();
        state.paused_at = Time::INVALID;
    }

    pub fn reset(&self) {
        self.set_time_stamp(Time::NULL);
    }

    /// Freezes or resumes the timer. Resuming continues from the frozen value.
    pub fn pause(&self, paused: bool) {
        if paused == self.is_paused() {
            return;
        }

        if paused {
            let now = self.time_stamp();
            self.state.write().paused_at = now;
        } else {
            let frozen = self.state.read().paused_at;
            self.set_time_stamp(frozen);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused_at.is_valid()
    }

    /// `time_stamp - now`.
    pub fn offset(&self, time_stamp: Time) -> Time {
        time_stamp - self.time_stamp()
    }

    /// Keeps the current time when it is within `max_offset` of `time_stamp`,
    /// otherwise snaps to `time_stamp`. Returns the resulting time.
    pub fn correct_time_stamp(&self, time_stamp: Time, max_offset: Time) -> Time {
        let now = self.time_stamp();
        if !time_stamp.is_valid() || (time_stamp - now).abs() <= max_offset {
            return now;
        }

        self.set_time_stamp(time_stamp);
        time_stamp
    }

    /// Returns `target - now` while it stays within `max_offset`; otherwise
    /// snaps the timer to `target` and returns zero.
    pub fn correct_offset(&self, target: Time, max_offset: Time) -> Time {
        if target.is_valid() {
            let offset = self.offset(target);
            if offset.abs() <= max_offset {
                return offset;
            }
            tracing::debug!(
                "Timer drifted {} from target {}, resynchronizing",
                offset,
                target
            );
            self.set_time_stamp(target);
        }

        Time::NULL
    }

    /// Smooths `time_stamp() - delay` onto an even timeline. See [`TimeStampSmoother`].
    pub fn smooth_time_stamp(&mut self, ref_interval: Time, delay: Time) -> Time {
        let current = self.time_stamp() - delay;
        self.smoother.smooth(current, ref_interval)
    }

    /// Sleeps until `time_stamp() >= target`, in slices of at most
    /// [`MAX_SLEEP_SLICE`]. Returns `false` if `keep_waiting` asked to stop first.
    pub fn wait_until(&self, target: Time, mut keep_waiting: impl FnMut() -> bool) -> bool {
        loop {
            let remaining = self.offset(target);
            if !remaining.is_positive() {
                return true;
            }
            if !keep_waiting() {
                return false;
            }

            let remaining = Duration::from_micros(remaining.to_usec().max(1) as u64);
            std::thread::sleep(remaining.min(MAX_SLEEP_SLICE));
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("time_stamp", &self.time_stamp())
            .field("paused", &self.is_paused())
            .finish()
    }
}
