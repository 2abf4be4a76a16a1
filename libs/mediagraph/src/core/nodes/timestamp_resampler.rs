// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Timestamp drift correction and frame rate matching.
//!
//! Buffers arriving from several concatenated inputs (playlist items, stream
//! restarts) carry timestamps from unrelated epochs. [`TimeStampResampler`]
//! keeps a short list of epoch offsets and maps every timestamp onto the one
//! that keeps the output timeline closest to monotonic. All media types share
//! the same offsets so they stay aligned with each other.
//!
//! When a target frame rate is close to the source rate, video is retimed
//! onto the target rate and audio sample rates are scaled by the same ratio,
//! which changes playback speed slightly instead of dropping or repeating
//! frames.

use parking_lot::Mutex;

use crate::core::config::ResamplerConfig;
use crate::core::error::Result;
use crate::core::frames::{
    AudioBuffer, MediaBuffer, SubpictureBuffer, SubtitleBuffer, VideoBuffer,
};
use crate::core::ports::OutputPort;
use crate::core::time::{Interval, Time};
use crate::core::traits::Node;

/// Ratios closer to one than this are treated as "same rate".
const UNITY_EPSILON: f64 = 1e-6;

/// Frame rates that measured rates are snapped to.
pub const STANDARD_FRAME_RATES: [Interval; 8] = [
    Interval::ntsc_frequency(24),
    Interval::from_frequency(24),
    Interval::from_frequency(25),
    Interval::ntsc_frequency(30),
    Interval::from_frequency(30),
    Interval::from_frequency(50),
    Interval::ntsc_frequency(60),
    Interval::from_frequency(60),
];

/// Snaps `interval` to the closest standard frame rate when it is within
/// `max_ratio` of it; otherwise returns `interval` unchanged.
pub fn round_frame_rate(interval: Interval, max_ratio: f64) -> Interval {
    if !interval.is_valid() {
        return interval;
    }

    let freq = interval.to_frequency();
    let mut best = interval;
    let mut best_deviation = f64::MAX;
    for standard in STANDARD_FRAME_RATES {
        let deviation = (freq / standard.to_frequency() - 1.0).abs();
        if deviation < best_deviation {
            best_deviation = deviation;
            best = standard;
        }
    }

    if best_deviation <= max_ratio {
        best
    } else {
        interval
    }
}

fn scale(time: Time, ratio: f64) -> Time {
    if !time.is_valid() || ratio <= 0.0 {
        return time;
    }
    Time::from_usec((time.to_usec() as f64 / ratio).round() as i64)
}

pub struct TimeStampResampler {
    config: ResamplerConfig,
    target: Interval,
    /// Epoch offsets, most recently established first.
    offsets: Vec<Time>,
    highest_time_stamp: Time,
    ratio: f64,
    resampling: bool,
}

impl TimeStampResampler {
    pub fn new(config: ResamplerConfig) -> Self {
        let target = config.frame_interval();
        Self {
            config,
            target,
            offsets: Vec::new(),
            highest_time_stamp: Time::INVALID,
            ratio: 1.0,
            resampling: false,
        }
    }

    /// Sets the output frame rate and the largest speed change used to reach it.
    ///
    /// An invalid `target` keeps each video stream at its own rate, rounded
    /// to the nearest standard rate.
    pub fn set_frame_rate(&mut self, target: Interval, max_ratio: f64) {
        self.target = target;
        self.config.max_ratio = max_ratio;
    }

    pub fn frame_rate(&self) -> Interval {
        self.target
    }

    pub fn max_ratio(&self) -> f64 {
        self.config.max_ratio
    }

    /// True while video is being retimed onto a different rate.
    pub fn is_resampling(&self) -> bool {
        self.resampling
    }

    /// Target rate divided by source rate; one when not resampling.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn highest_time_stamp(&self) -> Time {
        self.highest_time_stamp
    }

    pub fn offsets(&self) -> &[Time] {
        &self.offsets
    }

    /// Forgets all offsets and the resampling state.
    pub fn reset(&mut self) {
        self.offsets.clear();
        self.highest_time_stamp = Time::INVALID;
        self.ratio = 1.0;
        self.resampling = false;
    }

    /// Maps an input timestamp onto the output timeline.
    pub fn correct(&mut self, time_stamp: Time) -> Time {
        self.correct_with_step(time_stamp, Time::NULL)
    }

    /// Like [`correct`](Self::correct), but a discontinuity lands `step`
    /// after the highest output so far instead of on top of it.
    pub fn correct_with_step(&mut self, time_stamp: Time, step: Time) -> Time {
        if !time_stamp.is_valid() {
            return time_stamp;
        }

        let threshold = Time::from_msec(self.config.discontinuity_threshold_ms);

        let mut best: Option<(Time, Time)> = None;
        if self.highest_time_stamp.is_valid() {
            for &offset in &self.offsets {
                let candidate = time_stamp + offset;
                let deviation = (self.highest_time_stamp - candidate).abs();
                if best.is_none_or(|(d, _)| deviation < d) {
                    best = Some((deviation, candidate));
                }
            }
        }

        let result = match best {
            Some((deviation, candidate)) if deviation <= threshold => candidate,
            _ => {
                let offset = if self.highest_time_stamp.is_valid() {
                    let step = if step.is_valid() && step.is_positive() {
                        step
                    } else {
                        Time::NULL
                    };
                    self.highest_time_stamp + step - time_stamp
                } else {
                    Time::NULL
                };
                self.add_offset(offset);
                time_stamp + offset
            }
        };

        if !self.highest_time_stamp.is_valid() || result > self.highest_time_stamp {
            self.highest_time_stamp = result;
        }
        result
    }

    fn add_offset(&mut self, offset: Time) {
        let window = Time::from_msec(self.config.offset_window_ms);
        let before = self.offsets.len();
        self.offsets.retain(|o| (*o - offset).abs() <= window);
        self.offsets.insert(0, offset);
        self.offsets.truncate(self.config.max_offsets.max(1));

        tracing::debug!(
            "New timestamp offset {} (dropped {} stale offsets)",
            offset,
            (before + 1).saturating_sub(self.offsets.len())
        );
    }

    pub fn process_video(&mut self, mut buffer: VideoBuffer) -> VideoBuffer {
        let source = buffer.format.frame_rate;
        let frame_time = if source.is_valid() {
            Time::new(1, source)
        } else {
            Time::NULL
        };
        let corrected = self.correct_with_step(buffer.time_stamp, frame_time);
        if !source.is_valid() || !corrected.is_valid() {
            buffer.time_stamp = corrected;
            return buffer;
        }

        let target = if self.target.is_valid() {
            self.target
        } else {
            round_frame_rate(source, self.config.max_ratio)
        };
        let ratio = target.to_frequency() / source.to_frequency();

        if (ratio - 1.0).abs() < self.config.max_ratio {
            let resample = (ratio - 1.0).abs() > UNITY_EPSILON;
            if resample != self.resampling {
                tracing::debug!(
                    "Video resampling {} ({:.3} fps -> {:.3} fps)",
                    if resample { "enabled" } else { "disabled" },
                    source.to_frequency(),
                    target.to_frequency()
                );
            }
            self.resampling = resample;
            self.ratio = if resample { ratio } else { 1.0 };

            let index = corrected.to_clock_rounded(source);
            buffer.format.frame_rate = target;
            buffer.time_stamp = Time::new(index, target);
        } else {
            if self.resampling {
                tracing::debug!(
                    "Frame rate {:.3} fps too far from {:.3} fps, resampling disabled",
                    source.to_frequency(),
                    target.to_frequency()
                );
            }
            self.resampling = false;
            self.ratio = 1.0;
            buffer.time_stamp = corrected;
        }
        buffer
    }

    pub fn process_audio(&mut self, mut buffer: AudioBuffer) -> AudioBuffer {
        let corrected = self.correct_with_step(buffer.time_stamp, buffer.duration());

        if self.resampling && buffer.format.sample_rate > 0 && corrected.is_valid() {
            let scaled = (buffer.format.sample_rate as f64 * self.ratio).floor() as u32 & !1;
            if scaled > 0 {
                let index = corrected.to_clock_rounded(buffer.format.sample_interval());
                buffer.format.sample_rate = scaled;
                buffer.time_stamp = Time::new(index, buffer.format.sample_interval());
                return buffer;
            }
        }

        buffer.time_stamp = corrected;
        buffer
    }

    pub fn process_subtitle(&mut self, mut buffer: SubtitleBuffer) -> SubtitleBuffer {
        let corrected = self.correct(buffer.time_stamp);
        if self.resampling {
            buffer.time_stamp = scale(corrected, self.ratio);
            buffer.duration = scale(buffer.duration, self.ratio);
        } else {
            buffer.time_stamp = corrected;
        }
        buffer
    }

    pub fn process_subpicture(&mut self, mut buffer: SubpictureBuffer) -> SubpictureBuffer {
        let corrected = self.correct(buffer.time_stamp);
        if self.resampling {
            buffer.time_stamp = scale(corrected, self.ratio);
            buffer.duration = scale(buffer.duration, self.ratio);
        } else {
            buffer.time_stamp = corrected;
        }
        buffer
    }

    pub fn process(&mut self, buffer: MediaBuffer) -> MediaBuffer {
        match buffer {
            MediaBuffer::Audio(b) => self.process_audio(b).into(),
            MediaBuffer::Video(b) => self.process_video(b).into(),
            MediaBuffer::Subtitle(b) => self.process_subtitle(b).into(),
            MediaBuffer::Subpicture(b) => self.process_subpicture(b).into(),
        }
    }
}

impl Default for TimeStampResampler {
    fn default() -> Self {
        Self::new(ResamplerConfig::default())
    }
}

/// [`TimeStampResampler`] as a graph node with one output port per media type.
pub struct TimeStampResamplerNode {
    resampler: Mutex<TimeStampResampler>,
    audio_output: OutputPort<AudioBuffer>,
    video_output: OutputPort<VideoBuffer>,
    subtitle_output: OutputPort<SubtitleBuffer>,
    subpicture_output: OutputPort<SubpictureBuffer>,
}

impl TimeStampResamplerNode {
    pub fn new(config: ResamplerConfig) -> Self {
        Self {
            resampler: Mutex::new(TimeStampResampler::new(config)),
            audio_output: OutputPort::new(),
            video_output: OutputPort::new(),
            subtitle_output: OutputPort::new(),
            subpicture_output: OutputPort::new(),
        }
    }

    pub fn set_frame_rate(&self, target: Interval, max_ratio: f64) {
        self.resampler.lock().set_frame_rate(target, max_ratio);
    }

    pub fn is_resampling(&self) -> bool {
        self.resampler.lock().is_resampling()
    }

    pub fn audio_output(&self) -> &OutputPort<AudioBuffer> {
        &self.audio_output
    }

    pub fn video_output(&self) -> &OutputPort<VideoBuffer> {
        &self.video_output
    }

    pub fn subtitle_output(&self) -> &OutputPort<SubtitleBuffer> {
        &self.subtitle_output
    }

    pub fn subpicture_output(&self) -> &OutputPort<SubpictureBuffer> {
        &self.subpicture_output
    }

    // Emitting under the lock keeps outputs in correction order.
    pub fn input_audio(&self, buffer: AudioBuffer) {
        let mut resampler = self.resampler.lock();
        self.audio_output.emit(resampler.process_audio(buffer));
    }

    pub fn input_video(&self, buffer: VideoBuffer) {
        let mut resampler = self.resampler.lock();
        self.video_output.emit(resampler.process_video(buffer));
    }

    pub fn input_subtitle(&self, buffer: SubtitleBuffer) {
        let mut resampler = self.resampler.lock();
        self.subtitle_output.emit(resampler.process_subtitle(buffer));
    }

    pub fn input_subpicture(&self, buffer: SubpictureBuffer) {
        let mut resampler = self.resampler.lock();
        self.subpicture_output
            .emit(resampler.process_subpicture(buffer));
    }

    pub fn input(&self, buffer: MediaBuffer) {
        match buffer {
            MediaBuffer::Audio(b) => self.input_audio(b),
            MediaBuffer::Video(b) => self.input_video(b),
            MediaBuffer::Subtitle(b) => self.input_subtitle(b),
            MediaBuffer::Subpicture(b) => self.input_subpicture(b),
        }
    }
}

impl Node for TimeStampResamplerNode {
    fn start(&self) -> Result<()> {
        self.resampler.lock().reset();
        Ok(())
    }

    fn stop(&self) {}

    fn name(&self) -> &str {
        "TimeStampResamplerNode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{AudioFormat, VideoFormat};
    use std::sync::Arc;

    fn video(ms: i64, rate: Interval) -> VideoBuffer {
        VideoBuffer::new(
            VideoFormat {
                width: 16,
                height: 16,
                frame_rate: rate,
            },
            Time::from_msec(ms),
        )
    }

    #[test]
    fn test_round_frame_rate() {
        assert_eq!(
            round_frame_rate(Interval::from_frequency_f64(24.9), 0.08),
            Interval::from_frequency(25)
        );
        assert_eq!(
            round_frame_rate(Interval::from_frequency_f64(29.95), 0.08),
            Interval::ntsc_frequency(30)
        );
        let odd = Interval::from_frequency(12);
        assert_eq!(round_frame_rate(odd, 0.08), odd);
        assert!(!round_frame_rate(Interval::default(), 0.08).is_valid());
    }

    #[test]
    fn test_first_timestamp_passes_through() {
        let mut resampler = TimeStampResampler::default();
        assert_eq!(resampler.correct(Time::from_msec(1234)), Time::from_msec(1234));
        assert_eq!(resampler.offsets(), &[Time::NULL]);
        assert_eq!(resampler.highest_time_stamp(), Time::from_msec(1234));
    }

    #[test]
    fn test_invalid_timestamp_untouched() {
        let mut resampler = TimeStampResampler::default();
        assert!(!resampler.correct(Time::INVALID).is_valid());
        assert!(resampler.offsets().is_empty());
    }

    #[test]
    fn test_discontinuity_pins_to_highest() {
        let mut resampler = TimeStampResampler::default();
        for ms in (0..=2000).step_by(40) {
            assert_eq!(resampler.correct(Time::from_msec(ms)), Time::from_msec(ms));
        }

        assert_eq!(resampler.correct(Time::from_msec(50_000)), Time::from_msec(2000));
        assert_eq!(resampler.correct(Time::from_msec(50_040)), Time::from_msec(2040));
        // The old epoch is more than 5 s away from the new one.
        assert_eq!(resampler.offsets(), &[Time::from_msec(-48_000)]);
    }

    #[test]
    fn test_video_discontinuity_steps_one_frame() {
        let mut resampler = TimeStampResampler::default();
        let rate = Interval::from_frequency(25);
        let out: Vec<Time> = [1920, 1960, 2000, 50_000, 50_040]
            .into_iter()
            .map(|ms| resampler.process_video(video(ms, rate)).time_stamp)
            .collect();
        let expected: Vec<Time> = [1920, 1960, 2000, 2040, 2080]
            .into_iter()
            .map(Time::from_msec)
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_audio_discontinuity_steps_one_buffer() {
        let mut resampler = TimeStampResampler::default();
        let audio = |ms| AudioBuffer::new(AudioFormat::new(48_000, 2), 1920, Time::from_msec(ms));
        for ms in (0..=400).step_by(40) {
            resampler.process_audio(audio(ms));
        }
        let out = resampler.process_audio(audio(90_000));
        assert_eq!(out.time_stamp, Time::from_msec(440));
    }

    #[test]
    fn test_scaled_sample_rate_rounds_down_to_even() {
        let mut resampler = TimeStampResampler::default();
        resampler.set_frame_rate(Interval::from_frequency(25), 0.08);
        resampler.process_video(video(0, Interval::from_frequency(24)));

        // 44100 * 25 / 24 = 45937.5
        let audio = AudioBuffer::new(AudioFormat::new(44_100, 2), 441, Time::NULL);
        assert_eq!(resampler.process_audio(audio).format.sample_rate, 45_936);
    }

    #[test]
    fn test_nearby_epochs_are_kept() {
        let mut resampler = TimeStampResampler::default();
        resampler.correct(Time::from_msec(20_000));
        // Jump back by 12 s: new offset +12 s, old offset 0 is outside the window.
        assert_eq!(resampler.correct(Time::from_msec(8_000)), Time::from_msec(20_000));
        // Jump to 31 s: the remaining +12 s offset gives 43 s, so it is
        // replaced by a -11 s offset.
        assert_eq!(resampler.correct(Time::from_msec(31_000)), Time::from_msec(20_000));
        assert_eq!(resampler.offsets(), &[Time::from_msec(-11_000)]);
    }

    #[test]
    fn test_offsets_capped() {
        let config = ResamplerConfig {
            max_offsets: 2,
            offset_window_ms: 1_000_000,
            ..Default::default()
        };
        let mut resampler = TimeStampResampler::new(config);
        resampler.correct(Time::from_sec(0));
        resampler.correct(Time::from_sec(100));
        resampler.correct(Time::from_sec(300));
        assert_eq!(resampler.offsets().len(), 2);
        assert_eq!(resampler.offsets()[0], Time::from_sec(-300));
    }

    #[test]
    fn test_video_snapped_to_frame_grid() {
        let mut resampler = TimeStampResampler::default();
        let rate = Interval::from_frequency(25);
        let out = resampler.process_video(video(83, rate));
        assert_eq!(out.time_stamp, Time::from_msec(80));
        assert!(!resampler.is_resampling());
    }

    #[test]
    fn test_video_and_audio_resampled() {
        let mut resampler = TimeStampResampler::default();
        resampler.set_frame_rate(Interval::from_frequency(25), 0.08);

        let out = resampler.process_video(video(1000, Interval::from_frequency(24)));
        assert!(resampler.is_resampling());
        assert_eq!(out.format.frame_rate, Interval::from_frequency(25));
        assert_eq!(out.time_stamp, Time::from_msec(960));

        let audio = AudioBuffer::new(AudioFormat::new(48_000, 2), 480, Time::from_msec(1000));
        let out = resampler.process_audio(audio);
        assert_eq!(out.format.sample_rate, 50_000);
        assert_eq!(out.time_stamp, Time::from_msec(960));
    }

    #[test]
    fn test_rate_too_far_passes_through() {
        let mut resampler = TimeStampResampler::default();
        resampler.set_frame_rate(Interval::from_frequency(50), 0.08);
        let out = resampler.process_video(video(1000, Interval::from_frequency(25)));
        assert!(!resampler.is_resampling());
        assert_eq!(out.format.frame_rate, Interval::from_frequency(25));
        assert_eq!(out.time_stamp, Time::from_msec(1000));
    }

    #[test]
    fn test_node_routes_each_type() {
        let node = Arc::new(TimeStampResamplerNode::new(ResamplerConfig::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        node.audio_output()
            .connect(move |b: AudioBuffer| s.lock().push(b.time_stamp));
        let s = Arc::clone(&seen);
        node.subtitle_output()
            .connect(move |b: SubtitleBuffer| s.lock().push(b.time_stamp));

        node.start().unwrap();
        node.input(
            AudioBuffer::new(AudioFormat::new(48_000, 2), 480, Time::from_msec(500)).into(),
        );
        node.input(MediaBuffer::Subtitle(SubtitleBuffer::new(
            Time::from_msec(60_000),
            Time::from_sec(2),
            vec!["hello".into()],
        )));

        // The subtitle is 59.5 s ahead, far beyond the discontinuity threshold.
        assert_eq!(
            *seen.lock(),
            vec![Time::from_msec(500), Time::from_msec(500)]
        );
    }
}
