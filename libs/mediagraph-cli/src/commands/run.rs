// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mediagraph::{
    BackendRegistry, Graph, Interval, MediaBuffer, TaskPriority, TimeStampResamplerNode,
    TimeStampSyncNode,
};

use crate::synthetic::{CountingSink, MediaSource, SyntheticSource};

/// Source frame rate; slightly off 25 fps so the resampler has work to do.
const SOURCE_FRAME_RATE: Interval = Interval::new(1000, 24_900);

/// Build and run `synthetic → resampler → sync → sink` for `seconds`.
pub fn run(config: Option<PathBuf>, seconds: u64, trace: Option<PathBuf>) -> Result<()> {
    let mut config = super::load_config(config)?;
    if trace.is_some() {
        config.scheduler.trace_file = trace;
    }

    let scheduler = config
        .scheduler
        .build()
        .context("Failed to create scheduler")?;
    let mut graph = Graph::with_config(config.graph.clone(), scheduler.clone());

    let registry = BackendRegistry::new();
    SyntheticSource::register(&registry, graph.timer(), SOURCE_FRAME_RATE)?;
    let (scheme, source) = registry
        .create_any::<dyn MediaSource>()
        .context("No media source registered")?;
    tracing::info!("Using '{}' source", scheme);

    let resampler = Arc::new(TimeStampResamplerNode::new(config.resampler.clone()));
    let sync = Arc::new(TimeStampSyncNode::new(&config.sync));
    let sink = Arc::new(CountingSink::default());

    // Source output is handed to the pool; one dependency keeps it in order.
    let handle = graph.handle();
    let owner = handle.register_object();
    let dependency = handle.new_dependency();
    let target = Arc::clone(&resampler);
    source.output().connect(move |buffer: MediaBuffer| {
        let resampler = Arc::clone(&target);
        handle.schedule(
            owner,
            Some(&dependency),
            TaskPriority::Normal.value(),
            move || resampler.input(buffer),
        );
    });

    resampler.audio_output().connect_node(&sync, TimeStampSyncNode::input_audio);
    resampler.video_output().connect_node(&sync, TimeStampSyncNode::input_video);
    sync.audio_output().connect_node(&sink, CountingSink::input_audio);
    sync.video_output().connect_node(&sink, CountingSink::input_video);

    graph.add_source(source)?;
    graph.add_node(Arc::clone(&resampler))?;
    graph.add_node(Arc::clone(&sync))?;
    graph.add_sink(Arc::clone(&sink))?;

    graph.start().context("Failed to start graph")?;
    tracing::info!("Running for {} s", seconds);
    std::thread::sleep(Duration::from_secs(seconds));
    graph.stop();

    let stats = sink.stats();
    println!("audio buffers: {} (last at {})", stats.audio, stats.last_audio);
    println!("video frames:  {} (last at {})", stats.video, stats.last_video);
    println!("resampling:    {}", resampler.is_resampling());

    if let Some(path) = scheduler.stop_trace()? {
        println!("trace written to {}", path.display());
    }

    Ok(())
}
