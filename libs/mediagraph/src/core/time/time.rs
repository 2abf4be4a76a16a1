// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Timestamps as a count of [`Interval`] ticks.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use super::interval::{clamp_i64, gcd};
use super::Interval;

/// `count * interval` seconds.
///
/// A `Time` with an invalid interval is itself invalid. Invalid times are
/// ordinary values: they compare equal to each other and less than every
/// valid time, and arithmetic involving them yields [`Time::INVALID`].
#[derive(Clone, Copy, Default)]
pub struct Time {
    count: i64,
    interval: Interval,
}

impl Time {
    /// Zero seconds.
    pub const NULL: Time = Time::new(0, Interval::new(1, 1));
    pub const INVALID: Time = Time::new(0, Interval::new(0, 0));

    pub const fn new(count: i64, interval: Interval) -> Self {
        Self { count, interval }
    }

    pub const fn from_sec(sec: i64) -> Self {
        Self::new(sec, Interval::new(1, 1))
    }

    pub const fn from_msec(msec: i64) -> Self {
        Self::new(msec, Interval::new(1, 1000))
    }

    pub const fn from_usec(usec: i64) -> Self {
        Self::new(usec, Interval::new(1, 1_000_000))
    }

    /// `count` ticks of a clock running at `hz`.
    pub const fn from_clock(count: i64, hz: i64) -> Self {
        Self::new(count, Interval::from_frequency(hz))
    }

    pub const fn count(&self) -> i64 {
        self.count
    }

    pub const fn interval(&self) -> Interval {
        self.interval
    }

    pub const fn is_valid(&self) -> bool {
        self.interval.is_valid()
    }

    pub const fn is_null(&self) -> bool {
        self.is_valid() && self.count == 0
    }

    pub const fn is_positive(&self) -> bool {
        self.is_valid() && self.count > 0
    }

    pub const fn is_negative(&self) -> bool {
        self.is_valid() && self.count < 0
    }

    pub fn abs(&self) -> Self {
        Self::new(self.count.saturating_abs(), self.interval)
    }

    pub fn to_sec(&self) -> i64 {
        self.scaled(1)
    }

    pub fn to_msec(&self) -> i64 {
        self.scaled(1000)
    }

    pub fn to_usec(&self) -> i64 {
        self.scaled(1_000_000)
    }

    /// Number of whole ticks of `rate` covered by this time, truncated toward zero.
    pub fn to_clock(&self, rate: Interval) -> i64 {
        match self.clock_ratio(rate) {
            Some((num, den)) => clamp_i64(num / den),
            None => 0,
        }
    }

    /// Number of ticks of `rate` nearest to this time.
    pub fn to_clock_rounded(&self, rate: Interval) -> i64 {
        match self.clock_ratio(rate) {
            Some((num, den)) => {
                let half = den / 2;
                let rounded = if num >= 0 {
                    (num + half) / den
                } else {
                    (num - half) / den
                };
                clamp_i64(rounded)
            }
            None => 0,
        }
    }

    /// Exact comparison across differing intervals.
    pub fn compare(a: &Time, b: &Time) -> Ordering {
        match (a.is_valid(), b.is_valid()) {
            (false, false) => return Ordering::Equal,
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            (true, true) => {}
        }

        if a.interval.same_as(&b.interval) {
            return a.count.cmp(&b.count);
        }

        let lhs = cross(a.count, a.interval.num(), b.interval.den());
        let rhs = cross(b.count, b.interval.num(), a.interval.den());
        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
            _ => a.as_f64().total_cmp(&b.as_f64()),
        }
    }

    fn scaled(&self, unit: i128) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        let num = self.count as i128 * self.interval.num() as i128;
        match num.checked_mul(unit) {
            Some(v) => clamp_i64(v / self.interval.den() as i128),
            None => clamp_i64(num / self.interval.den() as i128 * unit),
        }
    }

    fn clock_ratio(&self, rate: Interval) -> Option<(i128, i128)> {
        if !self.is_valid() || !rate.is_valid() {
            return None;
        }
        let num = (self.count as i128)
            .checked_mul(self.interval.num() as i128)?
            .checked_mul(rate.den() as i128)?;
        let den = (self.interval.den() as i128).checked_mul(rate.num() as i128)?;
        Some((num, den))
    }

    fn as_f64(&self) -> f64 {
        self.count as f64 * self.interval.num() as f64 / self.interval.den() as f64
    }
}

fn cross(count: i64, num: i64, den: i64) -> Option<i128> {
    (count as i128)
        .checked_mul(num as i128)?
        .checked_mul(den as i128)
}

/// The largest interval both `a` and `b` are whole multiples of, with the
/// multipliers for each.
fn common_tick(a: Interval, b: Interval) -> Option<(Interval, i128, i128)> {
    let (an, ad) = (a.num() as i128, a.den() as i128);
    let (bn, bd) = (b.num() as i128, b.den() as i128);

    let (mut tick_num, mut tick_den) = if ad == bd {
        (gcd(an as u128, bn as u128) as i128, ad)
    } else {
        let lhs = an.checked_mul(bd)?;
        let rhs = bn.checked_mul(ad)?;
        (gcd(lhs as u128, rhs as u128) as i128, ad.checked_mul(bd)?)
    };

    let g = gcd(tick_num as u128, tick_den as u128) as i128;
    if g > 1 {
        tick_num /= g;
        tick_den /= g;
    }
    if tick_num > i64::MAX as i128 || tick_den > i64::MAX as i128 {
        return None;
    }

    let scale_a = an.checked_mul(tick_den)? / ad.checked_mul(tick_num)?;
    let scale_b = bn.checked_mul(tick_den)? / bd.checked_mul(tick_num)?;
    Some((
        Interval::new(tick_num as i64, tick_den as i64),
        scale_a,
        scale_b,
    ))
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        Time::compare(self, other) == Ordering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        Time::compare(self, other)
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        if !self.is_valid() || !rhs.is_valid() {
            return Time::INVALID;
        }

        if self.interval.same_as(&rhs.interval) {
            return Time::new(self.count.saturating_add(rhs.count), self.interval);
        }

        let exact = common_tick(self.interval, rhs.interval).and_then(|(tick, sa, sb)| {
            let lhs = (self.count as i128).checked_mul(sa)?;
            let rhs = (rhs.count as i128).checked_mul(sb)?;
            let sum = lhs.checked_add(rhs)?;
            i64::try_from(sum).ok().map(|count| Time::new(count, tick))
        });

        exact.unwrap_or_else(|| Time::from_usec(self.to_usec().saturating_add(rhs.to_usec())))
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        self + (-rhs)
    }
}

impl Neg for Time {
    type Output = Time;

    fn neg(self) -> Time {
        Time::new(self.count.saturating_neg(), self.interval)
    }
}

impl Mul<i64> for Time {
    type Output = Time;

    fn mul(self, rhs: i64) -> Time {
        if !self.is_valid() {
            return Time::INVALID;
        }
        match self.count.checked_mul(rhs) {
            Some(count) => Time::new(count, self.interval),
            None => Time::new(self.count, self.interval * rhs),
        }
    }
}

impl Div<i64> for Time {
    type Output = Time;

    fn div(self, rhs: i64) -> Time {
        if !self.is_valid() || rhs == 0 {
            return Time::INVALID;
        }
        if self.count % rhs == 0 {
            return Time::new(self.count / rhs, self.interval);
        }
        let interval = self.interval / rhs;
        if interval.is_valid() {
            Time::new(self.count, interval)
        } else {
            Time::new(self.count / rhs, self.interval)
        }
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        *self = *self + rhs;
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        *self = *self - rhs;
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Time({} x {})", self.count, self.interval)
        } else {
            write!(f, "Time(invalid)")
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}ms", self.to_msec())
        } else {
            write!(f, "invalid")
        }
    }
}
