// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Rational time model shared by every component.

mod interval;
#[allow(clippy::module_inception)]
mod time;

pub use interval::Interval;
pub use time::Time;
