// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Decoder and encoder nodes driven through a running graph.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediagraph::{
    Decoder, DecoderNode, EncodedBuffer, Encoder, EncoderNode, Graph, GraphConfig, Interval,
    MediaKind, Memory, Result, Scheduler, StreamError, Time, VideoBuffer, VideoFormat,
};
use parking_lot::Mutex;

fn packet(ms: i64) -> EncodedBuffer {
    EncodedBuffer::new(MediaKind::Video, "test", Time::from_msec(ms), Memory::zeroed(16))
}

fn frame(time_stamp: Time) -> VideoBuffer {
    VideoBuffer::new(
        VideoFormat {
            width: 2,
            height: 2,
            frame_rate: Interval::from_frequency(25),
        },
        time_stamp,
    )
}

/// Holds one frame back, like a decoder with reordering delay.
struct DelayingDecoder {
    held: Option<Time>,
    active: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
}

impl DelayingDecoder {
    fn new(overlaps: Arc<AtomicUsize>) -> Self {
        Self {
            held: None,
            active: Arc::new(AtomicUsize::new(0)),
            overlaps,
        }
    }
}

impl Decoder for DelayingDecoder {
    type Input = EncodedBuffer;
    type Output = VideoBuffer;

    fn decode(&mut self, input: Option<EncodedBuffer>) -> Vec<VideoBuffer> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_micros(500));

        let out = match input {
            Some(packet) => self.held.replace(packet.presentation_time_stamp),
            None => self.held.take(),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        out.map(frame).into_iter().collect()
    }
}

struct BrokenDecoder;

impl Decoder for BrokenDecoder {
    type Input = EncodedBuffer;
    type Output = VideoBuffer;

    fn open(&mut self) -> Result<()> {
        Err(StreamError::NotFound("no hardware decoder".into()))
    }

    fn decode(&mut self, _input: Option<EncodedBuffer>) -> Vec<VideoBuffer> {
        Vec::new()
    }
}

/// One packet per frame, keyframe every `gop` frames.
struct CountingEncoder {
    gop: usize,
    encoded: usize,
}

impl Encoder for CountingEncoder {
    type Input = VideoBuffer;
    type Output = EncodedBuffer;

    fn encode(&mut self, input: Option<VideoBuffer>) -> Vec<EncodedBuffer> {
        let Some(frame) = input else {
            return Vec::new();
        };
        let mut packet = EncodedBuffer::new(
            MediaKind::Video,
            "count",
            frame.time_stamp,
            Memory::new(vec![self.encoded as u8]),
        );
        packet.key_frame = self.encoded % self.gop == 0;
        packet.duration = frame.duration();
        self.encoded += 1;
        vec![packet]
    }
}

fn test_graph() -> Graph {
    Graph::with_config(
        GraphConfig {
            idle_poll_interval_ms: 5,
            ..Default::default()
        },
        Scheduler::with_threads(4).unwrap(),
    )
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}

#[test]
fn test_decoder_serialized_and_flushed_on_stop() {
    let mut graph = test_graph();
    let overlaps = Arc::new(AtomicUsize::new(0));
    let node = Arc::new(DecoderNode::new(
        graph.handle(),
        DelayingDecoder::new(Arc::clone(&overlaps)),
    ));
    let decoded = Arc::new(Mutex::new(Vec::new()));

    let d = Arc::clone(&decoded);
    node.output()
        .connect(move |frame: VideoBuffer| d.lock().push(frame.time_stamp));
    graph.add_node(Arc::clone(&node)).unwrap();
    graph.start().unwrap();

    // Packets arrive from several threads at once.
    let feeders: Vec<_> = (0..4)
        .map(|_| {
            let node = Arc::clone(&node);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    node.input(packet(0));
                }
            })
        })
        .collect();
    for feeder in feeders {
        feeder.join().unwrap();
    }

    assert!(wait_for(|| decoded.lock().len() == 19));
    graph.stop();

    // The held frame comes out on stop.
    assert_eq!(decoded.lock().len(), 20);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(graph.handle().in_flight(node.object_id()), 0);
}

#[test]
fn test_decoder_keeps_arrival_order() {
    let mut graph = test_graph();
    let node = Arc::new(DecoderNode::new(
        graph.handle(),
        DelayingDecoder::new(Arc::new(AtomicUsize::new(0))),
    ));
    let decoded = Arc::new(Mutex::new(Vec::new()));

    let d = Arc::clone(&decoded);
    node.output()
        .connect(move |frame: VideoBuffer| d.lock().push(frame.time_stamp));
    graph.add_node(Arc::clone(&node)).unwrap();
    graph.start().unwrap();

    for i in 0..30 {
        node.input(packet(i * 40));
    }
    graph.stop();

    let expected: Vec<Time> = (0..30).map(|i| Time::from_msec(i * 40)).collect();
    assert_eq!(*decoded.lock(), expected);
}

#[test]
fn test_decoder_open_failure_aborts_start() {
    let mut graph = test_graph();
    let node = Arc::new(DecoderNode::new(graph.handle(), BrokenDecoder));
    graph.add_node(Arc::clone(&node)).unwrap();

    match graph.start() {
        Err(StreamError::NodeStart { node, reason }) => {
            assert!(node.contains("BrokenDecoder"), "{}", node);
            assert!(reason.contains("no hardware decoder"), "{}", reason);
        }
        other => panic!("expected a node start error, got {:?}", other.map(|_| ())),
    }
    assert!(!graph.is_running());
}

#[test]
fn test_input_dropped_while_stopped() {
    let graph = test_graph();
    let node = DecoderNode::new(
        graph.handle(),
        DelayingDecoder::new(Arc::new(AtomicUsize::new(0))),
    );
    let count = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&count);
    node.output().connect(move |_: VideoBuffer| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    node.input(packet(0));
    node.input(packet(40));
    graph.scheduler().wait_for_done();

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(graph.handle().in_flight_total(), 0);
}

#[test]
fn test_encoder_chain_after_decoder() {
    let mut graph = test_graph();
    let decoder = Arc::new(DecoderNode::new(
        graph.handle(),
        DelayingDecoder::new(Arc::new(AtomicUsize::new(0))),
    ));
    let encoder = Arc::new(
        EncoderNode::new(graph.handle(), CountingEncoder { gop: 4, encoded: 0 }).with_priority(10),
    );
    let packets = Arc::new(Mutex::new(Vec::new()));

    decoder.output().connect_node(&encoder, EncoderNode::input);
    let p = Arc::clone(&packets);
    encoder
        .output()
        .connect(move |packet: EncodedBuffer| p.lock().push(packet));

    graph.add_node(Arc::clone(&decoder)).unwrap();
    graph.add_node(Arc::clone(&encoder)).unwrap();
    graph.start().unwrap();

    for i in 0..9 {
        decoder.input(packet(i * 40));
    }
    assert!(wait_for(|| packets.lock().len() == 8));
    graph.stop();

    let packets = packets.lock();
    assert_eq!(packets.len(), 8);
    let key_frames: Vec<bool> = packets.iter().map(|p| p.key_frame).collect();
    assert_eq!(
        key_frames,
        vec![true, false, false, false, true, false, false, false]
    );
    assert_eq!(packets[7].presentation_time_stamp, Time::from_msec(280));
    assert_eq!(packets[0].duration, Time::from_msec(40));
}
