// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Graph start/stop behaviour with real sources, nodes and sinks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediagraph::{
    Dependency, Graph, GraphConfig, GraphHandle, GraphState, Interval, Node, ObjectId,
    OutputPort, Result, Scheduler, SinkNode, SourceNode, StreamError, Time, Timer, VideoBuffer,
    VideoFormat,
};
use parking_lot::Mutex;

fn frame(index: i64) -> VideoBuffer {
    VideoBuffer::new(
        VideoFormat {
            width: 8,
            height: 8,
            frame_rate: Interval::from_frequency(25),
        },
        Time::new(index, Interval::from_frequency(25)),
    )
}

/// Emits `total` frames, one per poll, then nothing.
struct CountdownSource {
    next: i64,
    total: i64,
    output: Arc<OutputPort<VideoBuffer>>,
    stops: Arc<AtomicUsize>,
}

impl SourceNode for CountdownSource {
    fn start(&mut self) -> Result<()> {
        self.next = 0;
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn process(&mut self) -> bool {
        if self.next >= self.total {
            return false;
        }
        self.output.emit(frame(self.next));
        self.next += 1;
        true
    }
}

/// Forwards each buffer through a graph task under its own dependency.
struct PassThrough {
    handle: GraphHandle,
    owner: ObjectId,
    dependency: Dependency,
    started: AtomicBool,
    output: Arc<OutputPort<VideoBuffer>>,
}

impl PassThrough {
    fn new(handle: GraphHandle) -> Self {
        let owner = handle.register_object();
        let dependency = handle.new_dependency();
        Self {
            handle,
            owner,
            dependency,
            started: AtomicBool::new(false),
            output: Arc::new(OutputPort::new()),
        }
    }

    fn input(&self, buffer: VideoBuffer) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        let output = Arc::clone(&self.output);
        self.handle
            .schedule(self.owner, Some(&self.dependency), 0, move || {
                std::thread::sleep(Duration::from_millis(1));
                output.emit(buffer);
            });
    }
}

impl Node for PassThrough {
    fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct CollectingSink {
    received: Mutex<Vec<Time>>,
    started: AtomicBool,
}

impl CollectingSink {
    fn input(&self, buffer: VideoBuffer) {
        self.received.lock().push(buffer.time_stamp);
    }

    fn len(&self) -> usize {
        self.received.lock().len()
    }
}

impl SinkNode for CollectingSink {
    fn start(&self, timer: &Timer) -> Result<()> {
        assert!(timer.time_stamp() < Time::from_sec(1));
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }
}

struct FailingNode;

impl Node for FailingNode {
    fn start(&self) -> Result<()> {
        Err(StreamError::Configuration("no backend".into()))
    }

    fn stop(&self) {}

    fn name(&self) -> &str {
        "FailingNode"
    }
}

fn test_graph() -> Graph {
    let scheduler = Scheduler::with_threads(4).unwrap();
    Graph::with_config(
        GraphConfig {
            idle_poll_interval_ms: 5,
            ..Default::default()
        },
        scheduler,
    )
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

struct Pipeline {
    graph: Graph,
    sink: Arc<CollectingSink>,
    stops: Arc<AtomicUsize>,
}

fn pipeline(total: i64) -> Pipeline {
    let mut graph = test_graph();
    let stops = Arc::new(AtomicUsize::new(0));
    let source_output = Arc::new(OutputPort::new());
    let node = Arc::new(PassThrough::new(graph.handle()));
    let sink = Arc::new(CollectingSink::default());

    source_output.connect_node(&node, PassThrough::input);
    node.output.connect_node(&sink, CollectingSink::input);

    graph
        .add_source(CountdownSource {
            next: 0,
            total,
            output: source_output,
            stops: Arc::clone(&stops),
        })
        .unwrap();
    graph.add_node(node).unwrap();
    graph.add_sink(Arc::clone(&sink)).unwrap();

    Pipeline { graph, sink, stops }
}

#[test]
fn test_end_to_end_delivers_in_order() {
    let Pipeline {
        mut graph,
        sink,
        stops,
    } = pipeline(10);

    graph.start().unwrap();
    assert!(graph.is_running());
    assert!(sink.started.load(Ordering::SeqCst));

    assert!(wait_for(|| sink.len() == 10));
    graph.stop();

    let received = sink.received.lock().clone();
    let expected: Vec<Time> = (0..10).map(|i| frame(i).time_stamp).collect();
    assert_eq!(received, expected);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(!sink.started.load(Ordering::SeqCst));
    assert_eq!(graph.state(), GraphState::Idle);

    drop(graph);
}

#[test]
fn test_stop_is_idempotent() {
    let Pipeline { mut graph, stops, .. } = pipeline(3);

    graph.stop();
    assert_eq!(stops.load(Ordering::SeqCst), 0);

    graph.start().unwrap();
    graph.stop();
    graph.stop();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(graph.handle().in_flight_total(), 0);
}

#[test]
fn test_start_twice_rejected() {
    let Pipeline { mut graph, .. } = pipeline(3);

    graph.start().unwrap();
    assert!(matches!(graph.start(), Err(StreamError::AlreadyRunning(_))));
    assert!(graph.is_running());
    graph.stop();
}

#[test]
fn test_restart_after_stop() {
    let Pipeline {
        mut graph, sink, ..
    } = pipeline(4);

    graph.start().unwrap();
    assert!(wait_for(|| sink.len() == 4));
    graph.stop();

    // The source rewinds on start.
    graph.start().unwrap();
    assert!(wait_for(|| sink.len() == 8));
    graph.stop();
}

#[test]
fn test_failed_node_rolls_back() {
    let Pipeline {
        mut graph,
        sink,
        stops,
    } = pipeline(3);
    graph.add_node(Arc::new(FailingNode)).unwrap();

    let result = graph.start();
    match result {
        Err(StreamError::NodeStart { node, .. }) => assert_eq!(node, "FailingNode"),
        other => panic!("expected a node start error, got {:?}", other.map(|_| ())),
    }

    assert_eq!(graph.state(), GraphState::Idle);
    assert!(!graph.is_running());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(!sink.started.load(Ordering::SeqCst));
}

#[test]
fn test_nodes_cannot_be_added_while_running() {
    let Pipeline { mut graph, .. } = pipeline(1);

    graph.start().unwrap();
    assert!(graph.add_node(Arc::new(FailingNode)).is_err());
    graph.stop();
    assert!(graph.add_node(Arc::new(FailingNode)).is_ok());
}

/// Emits a frame on every poll and counts the polls.
struct EndlessSource {
    polls: Arc<AtomicUsize>,
    output: Arc<OutputPort<VideoBuffer>>,
}

impl SourceNode for EndlessSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn process(&mut self) -> bool {
        let index = self.polls.fetch_add(1, Ordering::SeqCst) as i64;
        self.output.emit(frame(index));
        true
    }
}

/// Schedules one task per buffer; tasks block until the gate opens.
struct GatedNode {
    handle: GraphHandle,
    owner: ObjectId,
    open: Arc<AtomicBool>,
    finished: Arc<AtomicUsize>,
}

impl GatedNode {
    fn input(&self, _buffer: VideoBuffer) {
        let open = Arc::clone(&self.open);
        let finished = Arc::clone(&self.finished);
        self.handle.schedule(self.owner, None, 0, move || {
            while !open.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }
}

impl Node for GatedNode {
    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}
}

struct Gated {
    graph: Graph,
    node: Arc<GatedNode>,
    polls: Arc<AtomicUsize>,
}

fn gated_pipeline(max_tasks_per_object: usize) -> Gated {
    let mut graph = Graph::with_config(
        GraphConfig {
            max_tasks_per_object,
            idle_poll_interval_ms: 5,
            ..Default::default()
        },
        Scheduler::with_threads(4).unwrap(),
    );
    let handle = graph.handle();
    let node = Arc::new(GatedNode {
        owner: handle.register_object(),
        handle,
        open: Arc::new(AtomicBool::new(false)),
        finished: Arc::new(AtomicUsize::new(0)),
    });
    let polls = Arc::new(AtomicUsize::new(0));
    let output = Arc::new(OutputPort::new());
    output.connect_node(&node, GatedNode::input);

    graph
        .add_source(EndlessSource {
            polls: Arc::clone(&polls),
            output,
        })
        .unwrap();
    graph.add_node(Arc::clone(&node)).unwrap();

    Gated { graph, node, polls }
}

#[test]
fn test_saturated_object_pauses_polling() {
    let Gated {
        mut graph,
        node,
        polls,
    } = gated_pipeline(3);

    graph.start().unwrap();
    assert!(wait_for(|| graph.handle().in_flight(node.owner) == 3));

    // Blocked tasks hold the object at its limit; the source is not polled.
    let blocked_polls = polls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(polls.load(Ordering::SeqCst), blocked_polls);
    assert_eq!(blocked_polls, 3);
    assert!(graph.handle().in_flight(node.owner) <= 3);

    // Releasing the tasks resumes polling.
    node.open.store(true, Ordering::SeqCst);
    assert!(wait_for(|| polls.load(Ordering::SeqCst) > blocked_polls + 10));

    graph.stop();
    assert_eq!(graph.handle().in_flight_total(), 0);
    assert_eq!(
        node.finished.load(Ordering::SeqCst),
        polls.load(Ordering::SeqCst)
    );
}

#[test]
#[should_panic(expected = "tasks in flight")]
fn test_drop_with_tasks_in_flight_panics() {
    let Gated {
        mut graph, node, ..
    } = gated_pipeline(2);

    graph.start().unwrap();
    assert!(wait_for(|| graph.handle().in_flight(node.owner) == 2));

    // The tasks still complete before the drop reports the misuse.
    let open = Arc::clone(&node.open);
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        open.store(true, Ordering::SeqCst);
    });
    drop(graph);
}

#[test]
fn test_drop_after_stop_is_quiet() {
    let Gated {
        mut graph, node, ..
    } = gated_pipeline(2);

    graph.start().unwrap();
    assert!(wait_for(|| graph.handle().in_flight(node.owner) == 2));
    node.open.store(true, Ordering::SeqCst);
    graph.stop();

    let handle = graph.handle();
    drop(graph);
    assert_eq!(handle.in_flight_total(), 0);
    assert_eq!(handle.state(), GraphState::Idle);
    assert!(node.finished.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_tasks_dropped_while_idle() {
    let graph = test_graph();
    let handle = graph.handle();
    let owner = handle.register_object();
    let ran = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&ran);
    assert!(!handle.schedule(owner, None, 0, move || flag.store(true, Ordering::SeqCst)));
    graph.scheduler().wait_for_done();
    assert!(!ran.load(Ordering::SeqCst));
}
