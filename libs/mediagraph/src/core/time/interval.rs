// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Tick interval expressed as a fraction of one second.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Div, Mul};

/// A fraction of one second, `num / den`.
///
/// Valid only when both parts are positive. The default value is invalid and
/// is used to mean "unknown" (for instance an unknown frame rate).
#[derive(Clone, Copy, Default)]
pub struct Interval {
    num: i64,
    den: i64,
}

impl Interval {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    pub const fn num(&self) -> i64 {
        self.num
    }

    pub const fn den(&self) -> i64 {
        self.den
    }

    pub const fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Divides both parts by their greatest common divisor.
    pub fn simplified(&self) -> Self {
        if self.den == 0 {
            return *self;
        }

        let g = gcd(self.num.unsigned_abs() as u128, self.den.unsigned_abs() as u128);
        if g <= 1 {
            return *self;
        }

        Self {
            num: self.num / g as i64,
            den: self.den / g as i64,
        }
    }

    /// Interval of one period at `hz`.
    pub const fn from_frequency(hz: i64) -> Self {
        Self { num: 1, den: hz }
    }

    /// Interval of one period at a possibly fractional rate such as 29.97.
    pub fn from_frequency_f64(hz: f64) -> Self {
        if !hz.is_finite() || hz <= 0.0 {
            return Self::default();
        }

        if hz.fract() == 0.0 {
            Self::new(1, hz as i64)
        } else {
            Self::new(1000, (hz * 1000.0).round() as i64).simplified()
        }
    }

    /// The 1000/1001 rate variant used by NTSC, e.g. `ntsc_frequency(30)` is 29.97 Hz.
    pub const fn ntsc_frequency(hz: i64) -> Self {
        Self {
            num: 1001,
            den: hz * 1000,
        }
    }

    /// Number of periods per second, or zero when invalid.
    pub fn to_frequency(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        self.den as f64 / self.num as f64
    }

    /// Whole seconds covered by `count` periods, truncated toward zero.
    pub fn to_time(&self, count: i64) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        clamp_i64(count as i128 * self.num as i128 / self.den as i128)
    }

    pub(crate) fn same_as(&self, other: &Self) -> bool {
        self.num == other.num && self.den == other.den
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Interval {}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => {
                let lhs = self.num as i128 * other.den as i128;
                let rhs = other.num as i128 * self.den as i128;
                lhs.cmp(&rhs)
            }
        }
    }
}

impl Mul<i64> for Interval {
    type Output = Interval;

    fn mul(self, rhs: i64) -> Interval {
        match self.num.checked_mul(rhs) {
            Some(num) => Interval::new(num, self.den).simplified(),
            None => Interval::default(),
        }
    }
}

impl Div<i64> for Interval {
    type Output = Interval;

    fn div(self, rhs: i64) -> Interval {
        match self.den.checked_mul(rhs) {
            Some(den) => Interval::new(self.num, den).simplified(),
            None => Interval::default(),
        }
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interval({}/{})", self.num, self.den)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

pub(crate) fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

pub(crate) fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
