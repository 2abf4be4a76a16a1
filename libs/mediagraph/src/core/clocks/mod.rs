// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod smoothing;
mod timer;

pub use smoothing::TimeStampSmoother;
pub use timer::{absolute_time_stamp, Timer, MAX_SLEEP_SLICE};
