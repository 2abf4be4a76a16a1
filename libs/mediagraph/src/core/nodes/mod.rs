// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod timestamp_resampler;
mod timestamp_sync;

pub use timestamp_resampler::{
    round_frame_rate, TimeStampResampler, TimeStampResamplerNode, STANDARD_FRAME_RATES,
};
pub use timestamp_sync::{TimeStampSync, TimeStampSyncNode};
