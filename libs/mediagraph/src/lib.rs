// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Media graph execution with timestamp correction and stream alignment.
//!
//! A [`Graph`] owns sources, nodes and sinks and drives its sources from a
//! dedicated production loop. Work is dispatched through the [`Scheduler`],
//! which serializes tasks sharing a [`Dependency`]. Timestamps are
//! [`Time`] values on rational [`Interval`] ticks; [`TimeStampResamplerNode`]
//! and [`TimeStampSyncNode`] rewrite them into one coherent timeline.

#![allow(clippy::type_complexity)] // Subscriber and factory types are clear in context
#![allow(clippy::new_without_default)] // Nodes are built from explicit config

pub mod core;

pub use crate::core::{
    absolute_time_stamp,
    round_frame_rate,
    AudioBuffer,
    AudioFormat,
    BackendRegistry,
    Decoder,
    DecoderNode,
    Dependency,
    EncodedBuffer,
    Encoder,
    EncoderNode,
    Graph,
    GraphConfig,
    GraphHandle,
    GraphState,
    Interval,
    MediaBuffer,
    MediaGraphConfig,
    MediaKind,
    Memory,
    Node,
    ObjectId,
    OutputPort,
    ResamplerConfig,
    Result,
    Scheduler,
    SchedulerConfig,
    SinkNode,
    SourceNode,
    StreamError,
    SubpictureBuffer,
    SubtitleBuffer,
    SyncConfig,
    TaskPriority,
    ThreadPool,
    Time,
    TimeStampResampler,
    TimeStampResamplerNode,
    TimeStampSmoother,
    TimeStampSync,
    TimeStampSyncNode,
    Timer,
    TraceEvent,
    VideoBuffer,
    VideoFormat,
};

pub use crate::core::prelude;
