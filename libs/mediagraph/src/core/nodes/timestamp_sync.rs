// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Audio/video alignment onto one output timeline.
//!
//! Every stream id gets its own queue ordered by input timestamp and its own
//! output cursor. Nothing is emitted until every active queue holds a quorum
//! of buffers; after that, audio is released up to the earliest pending
//! video frame and video follows the audio watermark, repeating frames to
//! keep a steady cadence across gaps. Without video, audio flows through a
//! bounded delay line on its own (and likewise for video without audio),
//! keeping its input timestamps.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::core::config::SyncConfig;
use crate::core::error::Result;
use crate::core::frames::{
    AudioBuffer, MediaBuffer, SubpictureBuffer, SubtitleBuffer, VideoBuffer,
};
use crate::core::ports::OutputPort;
use crate::core::time::{Interval, Time};
use crate::core::traits::Node;

/// Frame period assumed while the frame rate is unknown.
const FALLBACK_FRAME_TIME: Time = Time::from_msec(15);

struct Queue<B> {
    /// Keyed by input timestamp; the sequence number keeps equal timestamps apart.
    buffers: BTreeMap<(Time, u64), B>,
    /// Output cursor.
    time: Time,
}

impl<B> Queue<B> {
    fn new(time: Time) -> Self {
        Self {
            buffers: BTreeMap::new(),
            time,
        }
    }

    fn len(&self) -> usize {
        self.buffers.len()
    }

    fn first_key(&self) -> Option<Time> {
        self.buffers.keys().next().map(|(t, _)| *t)
    }

    fn pop_first(&mut self) -> Option<(Time, B)> {
        self.buffers.pop_first().map(|((t, _), b)| (t, b))
    }

    /// Removes and returns every entry at or after `time`.
    fn split_from(&mut self, time: Time) -> BTreeMap<(Time, u64), B> {
        self.buffers.split_off(&(time, 0))
    }

    fn drop_before(&mut self, time: Time) {
        while self.first_key().is_some_and(|key| key < time) {
            self.buffers.pop_first();
        }
    }

    /// Moves the cursor forward, ignoring unknown durations.
    fn advance(&mut self, by: Time) {
        if by.is_valid() {
            self.time += by;
        }
    }
}

fn min_of(current: Option<Time>, value: Time) -> Option<Time> {
    Some(match current {
        Some(current) => current.min(value),
        None => value,
    })
}

pub struct TimeStampSync {
    audio: BTreeMap<u16, Queue<AudioBuffer>>,
    video: BTreeMap<u16, Queue<VideoBuffer>>,
    max_audio_buffer_count: usize,
    max_video_buffer_count: usize,
    max_audio_delay: Time,
    max_video_delay: Time,
    running: bool,
    first_time_stamp: Time,
    /// Lowest input timestamp of the audio released so far.
    in_time_stamp: Time,
    frame_rate: Interval,
    start_time: Time,
    sequence: u64,
}

impl TimeStampSync {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            audio: BTreeMap::new(),
            video: BTreeMap::new(),
            max_audio_buffer_count: config.max_audio_buffer_count.max(1),
            max_video_buffer_count: config.max_video_buffer_count.max(1),
            max_audio_delay: config.max_audio_delay(),
            max_video_delay: config.max_video_delay(),
            running: false,
            first_time_stamp: Time::INVALID,
            in_time_stamp: Time::NULL,
            frame_rate: config.frame_interval(),
            start_time: config.start_time(),
            sequence: 0,
        }
    }

    pub fn frame_rate(&self) -> Interval {
        self.frame_rate
    }

    pub fn set_frame_rate(&mut self, frame_rate: Interval) {
        self.frame_rate = frame_rate;
    }

    pub fn start_time(&self) -> Time {
        self.start_time
    }

    /// Initial cursor of queues created from now on.
    pub fn set_start_time(&mut self, start_time: Time) {
        self.start_time = start_time;
    }

    /// Input timestamp that output started from; invalid until the quorum is met.
    pub fn first_time_stamp(&self) -> Time {
        self.first_time_stamp
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Buffers currently held back, audio and video combined.
    pub fn queued(&self) -> usize {
        self.audio.values().map(Queue::len).sum::<usize>()
            + self.video.values().map(Queue::len).sum::<usize>()
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn frame_time(&self) -> Time {
        if self.frame_rate.is_valid() {
            Time::new(1, self.frame_rate)
        } else {
            FALLBACK_FRAME_TIME
        }
    }

    /// Queues an audio buffer and returns whatever became ready, in order.
    pub fn input_audio(&mut self, buffer: AudioBuffer) -> Vec<MediaBuffer> {
        let mut out = Vec::new();
        let time_stamp = buffer.time_stamp;
        if !time_stamp.is_valid() {
            tracing::trace!("Dropping audio buffer without timestamp");
            return out;
        }
        if self.first_time_stamp.is_valid() && time_stamp < self.first_time_stamp {
            return out;
        }

        let audio_only = self.video.is_empty();
        let sequence = self.next_sequence();
        let start_time = self.start_time;
        let max_delay = self.max_audio_delay;
        let max_count = self.max_audio_buffer_count;
        let queue = self
            .audio
            .entry(buffer.stream_id)
            .or_insert_with(|| Queue::new(start_time));

        // Buffers far ahead of this one belong to an input that was replaced.
        let stale = queue.split_from(time_stamp + max_delay);
        if !stale.is_empty() {
            tracing::trace!("Dropping {} audio buffers ahead of {}", stale.len(), time_stamp);
        }

        if !audio_only && queue.len() >= max_count {
            queue.pop_first();
        }
        queue.buffers.insert((time_stamp, sequence), buffer);

        if !audio_only {
            self.output(&mut out);
            return out;
        }

        while let Some(key) = queue.first_key() {
            if (time_stamp - key).abs() <= max_delay && queue.len() <= max_count {
                break;
            }
            if let Some((_, buffer)) = queue.pop_first() {
                out.push(buffer.into());
            }
        }
        out
    }

    /// Queues a video buffer and returns whatever became ready, in order.
    pub fn input_video(&mut self, buffer: VideoBuffer) -> Vec<MediaBuffer> {
        let mut out = Vec::new();
        let time_stamp = buffer.time_stamp;
        if !time_stamp.is_valid() {
            tracing::trace!("Dropping video buffer without timestamp");
            return out;
        }
        if self.first_time_stamp.is_valid() && time_stamp < self.first_time_stamp {
            return out;
        }

        if !self.video.contains_key(&buffer.stream_id) && !self.frame_rate.is_valid() {
            self.frame_rate = buffer.format.frame_rate;
            if self.frame_rate.is_valid() {
                tracing::debug!(
                    "Sync frame rate set to {:.3} fps",
                    self.frame_rate.to_frequency()
                );
            }
        }

        let video_only = self.audio.is_empty();
        let sequence = self.next_sequence();
        let start_time = self.start_time;
        let max_delay = self.max_video_delay;
        let max_count = self.max_video_buffer_count;
        let queue = self
            .video
            .entry(buffer.stream_id)
            .or_insert_with(|| Queue::new(start_time));

        let stale = queue.split_from(time_stamp + max_delay);
        if !stale.is_empty() {
            tracing::trace!("Dropping {} video buffers ahead of {}", stale.len(), time_stamp);
        }

        if !video_only && queue.len() >= max_count {
            queue.pop_first();
        }
        queue.buffers.insert((time_stamp, sequence), buffer);

        if !video_only {
            self.output(&mut out);
            return out;
        }

        while let Some(key) = queue.first_key() {
            if (time_stamp - key).abs() <= max_delay && queue.len() <= max_count {
                break;
            }
            if let Some((_, buffer)) = queue.pop_first() {
                out.push(buffer.into());
            }
        }
        out
    }

    fn output(&mut self, out: &mut Vec<MediaBuffer>) {
        let min_buffers = if self.first_time_stamp.is_valid() {
            1
        } else {
            (self.max_video_buffer_count / 4).max(1)
        };

        let audio_ready =
            !self.audio.is_empty() && self.audio.values().all(|q| q.len() >= min_buffers);
        let video_ready =
            !self.video.is_empty() && self.video.values().all(|q| q.len() >= min_buffers);
        if !(audio_ready && video_ready) {
            return;
        }

        if !self.running {
            self.bootstrap();
            return;
        }

        self.release_audio_and_video(out);
    }

    fn bootstrap(&mut self) {
        if !self.first_time_stamp.is_valid() {
            let mut first = Time::NULL;
            for key in self.audio.values().filter_map(Queue::first_key) {
                first = first.max(key);
            }
            for key in self.video.values().filter_map(Queue::first_key) {
                first = first.max(key);
            }
            self.first_time_stamp = first;
        }

        let first = self.first_time_stamp;
        for queue in self.audio.values_mut() {
            queue.drop_before(first);
        }
        for queue in self.video.values_mut() {
            queue.drop_before(first);
        }

        self.running = true;
        tracing::debug!("Sync running from {}", first);
    }

    fn release_audio_and_video(&mut self, out: &mut Vec<MediaBuffer>) {
        let lowest_video_key = self.video.values().filter_map(Queue::first_key).min();

        let mut audio_time_min: Option<Time> = None;
        let mut audio_time_max: Option<Time> = None;
        let mut in_time: Option<Time> = None;

        if let Some(lowest_video_key) = lowest_video_key {
            for queue in self.audio.values_mut() {
                let mut at = queue.time;
                let mut it = self.in_time_stamp;
                audio_time_min = min_of(audio_time_min, at);

                // Releases up to and including the first buffer past the video key.
                while lowest_video_key >= it {
                    let Some((key, mut buffer)) = queue.pop_first() else {
                        break;
                    };
                    it = key;
                    buffer.time_stamp = queue.time;
                    at = queue.time;
                    queue.advance(buffer.duration());
                    out.push(buffer.into());
                }

                audio_time_max = min_of(audio_time_max, at);
                in_time = min_of(in_time, it);
            }
        }

        if let Some(in_time) = in_time {
            self.in_time_stamp = in_time;
        }

        let in_time_stamp = self.in_time_stamp;
        let frame_time = self.frame_time();
        let frame_rate_known = self.frame_rate.is_valid();

        for queue in self.video.values_mut() {
            let mut dropped = 0;
            while queue
                .first_key()
                .is_some_and(|key| key - in_time_stamp <= -frame_time)
            {
                queue.pop_first();
                dropped += 1;
            }
            if dropped > 0 {
                tracing::trace!("Dropped {} late video frames", dropped);
            }
        }

        let (Some(audio_time_min), Some(audio_time_max)) = (audio_time_min, audio_time_max) else {
            return;
        };

        for queue in self.video.values_mut() {
            while let Some(key) = queue.first_key() {
                let delta = key - in_time_stamp;
                if delta.is_positive() {
                    break;
                }
                let Some((_, buffer)) = queue.pop_first() else {
                    break;
                };
                let next_video_time_min = audio_time_min + delta;

                if !frame_rate_known {
                    let mut buffer = buffer;
                    buffer.time_stamp = next_video_time_min;
                    queue.time = next_video_time_min;
                    out.push(buffer.into());
                    continue;
                }

                if queue.time <= audio_time_max + frame_time {
                    loop {
                        let mut frame = buffer.clone();
                        frame.time_stamp = queue.time;
                        out.push(frame.into());
                        queue.time += frame_time;
                        if queue.time > next_video_time_min {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Emits everything still queued, audio then video.
    ///
    /// With both media present the buffers land on their output cursors; a
    /// single-media delay line keeps its input timestamps.
    pub fn flush(&mut self) -> Vec<MediaBuffer> {
        let mut out = Vec::new();
        let frame_time = self.frame_time();
        let retime = !self.audio.is_empty() && !self.video.is_empty();

        for queue in self.audio.values_mut() {
            while let Some((_, mut buffer)) = queue.pop_first() {
                if retime {
                    buffer.time_stamp = queue.time;
                    queue.advance(buffer.duration());
                }
                out.push(buffer.into());
            }
        }
        for queue in self.video.values_mut() {
            while let Some((_, mut buffer)) = queue.pop_first() {
                if retime {
                    buffer.time_stamp = queue.time;
                    queue.time += frame_time;
                }
                out.push(buffer.into());
            }
        }

        if !out.is_empty() {
            tracing::debug!("Sync flushed {} buffers", out.len());
        }
        out
    }
}

impl Default for TimeStampSync {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}

/// [`TimeStampSync`] as a graph node.
///
/// Subtitles and subpictures pass straight through.
pub struct TimeStampSyncNode {
    sync: Mutex<TimeStampSync>,
    audio_output: OutputPort<AudioBuffer>,
    video_output: OutputPort<VideoBuffer>,
    subtitle_output: OutputPort<SubtitleBuffer>,
    subpicture_output: OutputPort<SubpictureBuffer>,
}

impl TimeStampSyncNode {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            sync: Mutex::new(TimeStampSync::new(config)),
            audio_output: OutputPort::new(),
            video_output: OutputPort::new(),
            subtitle_output: OutputPort::new(),
            subpicture_output: OutputPort::new(),
        }
    }

    pub fn set_frame_rate(&self, frame_rate: Interval) {
        self.sync.lock().set_frame_rate(frame_rate);
    }

    pub fn set_start_time(&self, start_time: Time) {
        self.sync.lock().set_start_time(start_time);
    }

    pub fn first_time_stamp(&self) -> Time {
        self.sync.lock().first_time_stamp()
    }

    pub fn is_running(&self) -> bool {
        self.sync.lock().is_running()
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

    pub fn input_audio(&self, buffer: AudioBuffer) {
        let mut sync = self.sync.lock();
        let ready = sync.input_audio(buffer);
        self.emit(ready);
    }

    pub fn input_video(&self, buffer: VideoBuffer) {
        let mut sync = self.sync.lock();
        let ready = sync.input_video(buffer);
        self.emit(ready);
    }

    pub fn input_subtitle(&self, buffer: SubtitleBuffer) {
        self.subtitle_output.emit(buffer);
    }

    pub fn input_subpicture(&self, buffer: SubpictureBuffer) {
        self.subpicture_output.emit(buffer);
    }

    pub fn input(&self, buffer: MediaBuffer) {
        match buffer {
            MediaBuffer::Audio(b) => self.input_audio(b),
            MediaBuffer::Video(b) => self.input_video(b),
            MediaBuffer::Subtitle(b) => self.input_subtitle(b),
            MediaBuffer::Subpicture(b) => self.input_subpicture(b),
        }
    }

    /// Emits every queued buffer.
    pub fn flush(&self) {
        let mut sync = self.sync.lock();
        let ready = sync.flush();
        self.emit(ready);
    }

    // Called with the sync lock held so concurrent inputs cannot reorder output.
    fn emit(&self, ready: Vec<MediaBuffer>) {
        for buffer in ready {
            match buffer {
                MediaBuffer::Audio(b) => self.audio_output.emit(b),
                MediaBuffer::Video(b) => self.video_output.emit(b),
                MediaBuffer::Subtitle(b) => self.subtitle_output.emit(b),
                MediaBuffer::Subpicture(b) => self.subpicture_output.emit(b),
            }
        }
    }
}

impl Node for TimeStampSyncNode {
    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {
        self.flush();
    }

    fn name(&self) -> &str {
        "TimeStampSyncNode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{AudioFormat, VideoFormat};

    fn audio(ms: i64) -> AudioBuffer {
        // 40 ms at 48 kHz.
        AudioBuffer::new(AudioFormat::new(48_000, 2), 1920, Time::from_msec(ms))
    }

    fn video(ms: i64) -> VideoBuffer {
        VideoBuffer::new(
            VideoFormat {
                width: 16,
                height: 16,
                frame_rate: Interval::from_frequency(25),
            },
            Time::from_msec(ms),
        )
    }

    fn small_config() -> SyncConfig {
        SyncConfig {
            max_video_buffer_count: 32,
            ..Default::default()
        }
    }

    #[test]
    fn test_audio_only_delay_line() {
        let mut sync = TimeStampSync::new(&SyncConfig {
            max_audio_buffer_count: 4,
            audio_buffer_delay_ms: 1000,
            ..Default::default()
        });

        let mut out = Vec::new();
        for i in 0..6 {
            out.extend(sync.input_audio(audio(1000 + i * 40)));
        }
        // Four are held back; the two oldest were pushed out untouched.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].time_stamp(), Time::from_msec(1000));
        assert_eq!(out[1].time_stamp(), Time::from_msec(1040));

        let rest = sync.flush();
        assert_eq!(rest.len(), 4);
        assert_eq!(rest[3].time_stamp(), Time::from_msec(1200));
        assert_eq!(sync.queued(), 0);
    }

    #[test]
    fn test_audio_only_gap_survives_delay_line() {
        let mut sync = TimeStampSync::new(&SyncConfig {
            max_audio_buffer_count: 2,
            audio_buffer_delay_ms: 1000,
            ..Default::default()
        });

        let inputs: Vec<i64> = (0..4)
            .map(|i| 5000 + i * 40)
            .chain((0..4).map(|i| 6120 + i * 40))
            .collect();
        let mut out = Vec::new();
        for &ms in &inputs {
            out.extend(sync.input_audio(audio(ms)));
        }
        out.extend(sync.flush());

        let stamps: Vec<Time> = out.iter().map(MediaBuffer::time_stamp).collect();
        let expected: Vec<Time> = inputs.iter().map(|&ms| Time::from_msec(ms)).collect();
        assert_eq!(stamps, expected);
    }

    #[test]
    fn test_video_only_keeps_input_time_stamps() {
        let mut sync = TimeStampSync::new(&SyncConfig {
            max_video_buffer_count: 1,
            video_buffer_delay_ms: 1000,
            ..Default::default()
        });

        assert!(sync.input_video(video(3000)).is_empty());
        let out = sync.input_video(video(3040));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].time_stamp(), Time::from_msec(3000));
    }

    #[test]
    fn test_audio_only_restart_evicts_old_input() {
        let mut sync = TimeStampSync::default();
        assert!(sync.input_audio(audio(20_000)).is_empty());
        assert!(sync.input_audio(audio(20_040)).is_empty());

        // A new input starting at zero evicts the old buffers.
        assert!(sync.input_audio(audio(0)).is_empty());
        assert_eq!(sync.queued(), 1);

        let rest = sync.flush();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].time_stamp(), Time::NULL);
    }

    #[test]
    fn test_frame_rate_learned_from_video() {
        let mut sync = TimeStampSync::default();
        assert!(!sync.frame_rate().is_valid());
        sync.input_video(video(0));
        assert_eq!(sync.frame_rate(), Interval::from_frequency(25));
    }

    #[test]
    fn test_quorum_before_running() {
        let mut sync = TimeStampSync::new(&small_config());

        for i in 0..7 {
            assert!(sync.input_video(video(i * 40)).is_empty());
        }
        for i in 0..8 {
            assert!(sync.input_audio(audio(100 + i * 40)).is_empty());
        }
        assert!(!sync.is_running());

        // The eighth frame completes the quorum.
        assert!(sync.input_video(video(280)).is_empty());
        assert!(sync.is_running());
        assert_eq!(sync.first_time_stamp(), Time::from_msec(100));
    }

    #[test]
    fn test_input_before_first_time_stamp_dropped() {
        let mut sync = TimeStampSync::new(&small_config());
        for i in 0..8 {
            sync.input_video(video(200 + i * 40));
            sync.input_audio(audio(200 + i * 40));
        }
        assert!(sync.is_running());
        let queued = sync.queued();
        assert!(sync.input_audio(audio(0)).is_empty());
        assert_eq!(sync.queued(), queued);
    }
}
