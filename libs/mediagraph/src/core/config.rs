// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Engine configuration via `mediagraph.yaml`.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! tuned defaults. The sync and resampler thresholds are empirical and are
//! exposed here to be calibrated against real playback hardware.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, StreamError};
use crate::core::scheduling::Scheduler;
use crate::core::time::{Interval, Time};

/// Production loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// In-flight tasks per emitting object before sources stop being polled.
    pub max_tasks_per_object: usize,
    /// Back-off when no source produced anything.
    pub idle_poll_interval_ms: u64,
    /// Re-check cadence while draining on stop.
    pub stop_poll_interval_ms: u64,
    /// Base priority added to every task scheduled through the graph.
    pub priority: i32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_object: 3,
            idle_poll_interval_ms: 40,
            stop_poll_interval_ms: 125,
            priority: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Dedicated pool size. `None` uses the process-wide pool, `Some(0)` runs
    /// every task inline.
    pub worker_threads: Option<usize>,
    /// Write an SVG execution timeline here when the scheduler stops tracing.
    pub trace_file: Option<PathBuf>,
}

impl SchedulerConfig {
    pub fn build(&self) -> Result<Scheduler> {
        let scheduler = match self.worker_threads {
            None => Scheduler::global(),
            Some(0) => Scheduler::inline(),
            Some(n) => Scheduler::with_threads(n)?,
        };
        if let Some(path) = &self.trace_file {
            scheduler.start_trace(path);
        }
        Ok(scheduler)
    }
}

/// Timestamp sync thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub max_audio_buffer_count: usize,
    pub max_video_buffer_count: usize,
    /// Expected duration of one audio buffer.
    pub audio_buffer_delay_ms: i64,
    /// Expected duration of one video frame.
    pub video_buffer_delay_ms: i64,
    /// Initial value of every output cursor.
    pub start_time_ms: i64,
    /// Output frame rate. Learned from the first video buffer when unset.
    pub frame_rate: Option<f64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_audio_buffer_count: 256,
            max_video_buffer_count: 96,
            audio_buffer_delay_ms: 24,
            video_buffer_delay_ms: 40,
            start_time_ms: 0,
            frame_rate: None,
        }
    }
}

impl SyncConfig {
    pub fn max_audio_delay(&self) -> Time {
        Time::from_msec(self.audio_buffer_delay_ms * self.max_audio_buffer_count as i64)
    }

    pub fn max_video_delay(&self) -> Time {
        Time::from_msec(self.video_buffer_delay_ms * self.max_video_buffer_count as i64)
    }

    pub fn start_time(&self) -> Time {
        Time::from_msec(self.start_time_ms)
    }

    pub fn frame_interval(&self) -> Interval {
        self.frame_rate
            .map(Interval::from_frequency_f64)
            .unwrap_or_default()
    }
}

/// Timestamp resampler thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplerConfig {
    /// Target output frame rate; no rate resampling when unset.
    pub frame_rate: Option<f64>,
    /// Largest speed change applied to reach the target rate.
    pub max_ratio: f64,
    /// Epoch offsets tracked at once.
    pub max_offsets: usize,
    /// Deviation beyond which a new epoch offset is started.
    pub discontinuity_threshold_ms: i64,
    /// Offsets further than this from a new offset are forgotten.
    pub offset_window_ms: i64,
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self {
            frame_rate: None,
            max_ratio: 0.08,
            max_offsets: 4,
            discontinuity_threshold_ms: 10_000,
            offset_window_ms: 5_000,
        }
    }
}

impl ResamplerConfig {
    pub fn frame_interval(&self) -> Interval {
        self.frame_rate
            .map(Interval::from_frequency_f64)
            .unwrap_or_default()
    }
}

/// Top-level configuration from `mediagraph.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaGraphConfig {
    pub graph: GraphConfig,
    pub scheduler: SchedulerConfig,
    pub sync: SyncConfig,
    pub resampler: ResamplerConfig,
}

impl MediaGraphConfig {
    pub const FILE_NAME: &'static str = "mediagraph.yaml";

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| StreamError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file. Errors if it is missing, unparseable or
    /// out of range.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            StreamError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        tracing::info!("Loaded mediagraph config from {}", path.display());
        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| StreamError::Configuration(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.graph.max_tasks_per_object == 0 {
            return Err(StreamError::Configuration(
                "graph.max_tasks_per_object must be at least 1".into(),
            ));
        }
        if self.sync.max_audio_buffer_count == 0 || self.sync.max_video_buffer_count == 0 {
            return Err(StreamError::Configuration(
                "sync buffer counts must be at least 1".into(),
            ));
        }
        if !(self.resampler.max_ratio > 0.0 && self.resampler.max_ratio < 1.0) {
            return Err(StreamError::Configuration(format!(
                "resampler.max_ratio must be in (0, 1), got {}",
                self.resampler.max_ratio
            )));
        }
        if self.resampler.max_offsets == 0 {
            return Err(StreamError::Configuration(
                "resampler.max_offsets must be at least 1".into(),
            ));
        }
        for (key, rate) in [
            ("sync.frame_rate", self.sync.frame_rate),
            ("resampler.frame_rate", self.resampler.frame_rate),
        ] {
            if let Some(rate) = rate {
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(StreamError::Configuration(format!(
                        "{} must be positive, got {}",
                        key, rate
                    )));
                }
            }
        }
        Ok(())
    }
}
