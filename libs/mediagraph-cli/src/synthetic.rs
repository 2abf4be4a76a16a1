// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Synthetic source and counting sink used by `mediagraph run`.

use std::sync::atomic::{AtomicU64, Ordering};

use mediagraph::{
    AudioBuffer, AudioFormat, BackendRegistry, Interval, MediaBuffer, OutputPort, SinkNode,
    SourceNode, StreamError, Time, Timer, VideoBuffer, VideoFormat,
};
use parking_lot::Mutex;

/// Sources that publish mixed media on one port.
pub trait MediaSource: SourceNode {
    fn output(&self) -> &OutputPort<MediaBuffer>;
}

/// How far ahead of the graph clock buffers are produced.
const LEAD: Time = Time::from_msec(100);

/// Silence at 48 kHz and blank frames at a fixed rate, paced by the graph timer.
/// Frame timestamps alternate by `jitter` around their nominal position.
pub struct SyntheticSource {
    timer: Timer,
    audio_format: AudioFormat,
    samples_per_buffer: usize,
    video_format: VideoFormat,
    jitter: Time,
    next_audio: Time,
    next_frame: i64,
    output: OutputPort<MediaBuffer>,
}

impl SyntheticSource {
    pub fn new(timer: Timer, frame_rate: Interval) -> Self {
        Self {
            timer,
            audio_format: AudioFormat::new(48_000, 2),
            samples_per_buffer: 1152,
            video_format: VideoFormat {
                width: 320,
                height: 180,
                frame_rate,
            },
            jitter: Time::from_msec(3),
            next_audio: Time::NULL,
            next_frame: 0,
            output: OutputPort::new(),
        }
    }

    /// Registers this source under the `synthetic` scheme.
    pub fn register(
        registry: &BackendRegistry,
        timer: &Timer,
        frame_rate: Interval,
    ) -> mediagraph::Result<()> {
        let timer = timer.synced();
        registry.register::<dyn MediaSource>("synthetic", 0, move || {
            Box::new(SyntheticSource::new(timer.synced(), frame_rate))
        })
    }
}

impl MediaSource for SyntheticSource {
    fn output(&self) -> &OutputPort<MediaBuffer> {
        &self.output
    }
}

impl SourceNode for SyntheticSource {
    fn start(&mut self) -> mediagraph::Result<()> {
        if !self.video_format.frame_rate.is_valid() {
            return Err(StreamError::Configuration(
                "synthetic source needs a valid frame rate".into(),
            ));
        }
        self.next_audio = Time::NULL;
        self.next_frame = 0;
        Ok(())
    }

    fn stop(&mut self) {
        tracing::debug!(
            "Synthetic source stopped after {} frames",
            self.next_frame
        );
    }

    fn process(&mut self) -> bool {
        let horizon = self.timer.time_stamp() + LEAD;
        let mut produced = false;

        while self.next_audio <= horizon {
            let buffer = AudioBuffer::new(self.audio_format, self.samples_per_buffer, self.next_audio);
            self.next_audio += buffer.duration();
            self.output.emit(buffer.into());
            produced = true;
        }

        loop {
            let nominal = Time::new(self.next_frame, self.video_format.frame_rate);
            if nominal > horizon {
                break;
            }
            let jitter = if self.next_frame % 2 == 0 {
                self.jitter
            } else {
                -self.jitter
            };
            let frame = VideoBuffer::new(self.video_format, nominal + jitter);
            self.next_frame += 1;
            self.output.emit(frame.into());
            produced = true;
        }

        produced
    }

    fn name(&self) -> &str {
        "SyntheticSource"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SinkStats {
    pub audio: u64,
    pub video: u64,
    pub last_audio: Time,
    pub last_video: Time,
}

/// Counts what reaches the end of the pipeline.
#[derive(Default)]
pub struct CountingSink {
    audio: AtomicU64,
    video: AtomicU64,
    last: Mutex<(Time, Time)>,
}

impl CountingSink {
    pub fn input_audio(&self, buffer: AudioBuffer) {
        self.audio.fetch_add(1, Ordering::Relaxed);
        self.last.lock().0 = buffer.time_stamp;
    }

    pub fn input_video(&self, buffer: VideoBuffer) {
        self.video.fetch_add(1, Ordering::Relaxed);
        self.last.lock().1 = buffer.time_stamp;
    }

    pub fn stats(&self) -> SinkStats {
        let (last_audio, last_video) = *self.last.lock();
        SinkStats {
            audio: self.audio.load(Ordering::Relaxed),
            video: self.video.load(Ordering::Relaxed),
            last_audio,
            last_video,
        }
    }
}

impl SinkNode for CountingSink {
    fn start(&self, timer: &Timer) -> mediagraph::Result<()> {
        tracing::debug!("Counting sink started at {}", timer.time_stamp());
        Ok(())
    }

    fn stop(&self) {}

    fn name(&self) -> &str {
        "CountingSink"
    }
}
