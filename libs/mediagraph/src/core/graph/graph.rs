// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use super::handle::{GraphEvent, GraphShared};
use super::{GraphHandle, GraphState};
use crate::core::clocks::Timer;
use crate::core::config::GraphConfig;
use crate::core::error::{Result, StreamError};
use crate::core::scheduling::Scheduler;
use crate::core::traits::{Node, SinkNode, SourceNode};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

type SharedSource = Arc<Mutex<dyn SourceNode>>;

/// Owns the sources, nodes and sinks of one pipeline and drives it.
///
/// `start()` starts sources, then nodes, then sinks (each sink gets the
/// graph timer), and spawns the production loop thread. The loop polls every
/// source, backs off when none produced anything, and skips polling while
/// any object has too many tasks in flight. `stop()` drains in-flight tasks,
/// joins the loop and stops sinks, nodes and sources in that order.
/// Dropping a graph stops it; dropping one with tasks still in flight
/// drains them and then panics, so callers must `stop()` first.
pub struct Graph {
    shared: Arc<GraphShared>,
    events_rx: Receiver<GraphEvent>,
    sources: Vec<SharedSource>,
    nodes: Vec<Arc<dyn Node>>,
    sinks: Vec<Arc<dyn SinkNode>>,
    timer: Timer,
    worker: Option<JoinHandle<()>>,
}

impl Graph {
    /// Graph with default settings on the process-wide scheduler.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default(), Scheduler::global())
    }

    pub fn with_config(config: GraphConfig, scheduler: Scheduler) -> Self {
        let id = NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed);
        let name = format!("graph-{}", id);
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        tracing::debug!(
            "[{}] Created (max {} tasks per object, idle poll {}ms)",
            name,
            config.max_tasks_per_object,
            config.idle_poll_interval_ms
        );

        Self {
            shared: Arc::new(GraphShared::new(name, config, scheduler, events_tx)),
            events_rx,
            sources: Vec::new(),
            nodes: Vec::new(),
            sinks: Vec::new(),
            timer: Timer::new(),
            worker: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn handle(&self) -> GraphHandle {
        GraphHandle::new(Arc::clone(&self.shared))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    /// Graph-wide timer handed to sinks. Reset to zero on every start.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn state(&self) -> GraphState {
        *self.shared.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == GraphState::Running
    }

    pub fn set_priority(&self, priority: i32) {
        self.handle().set_priority(priority);
    }

    pub fn add_source<S: SourceNode + 'static>(&mut self, source: S) -> Result<()> {
        self.ensure_idle("add a source")?;
        self.sources.push(Arc::new(Mutex::new(source)));
        Ok(())
    }

    pub fn add_node<N: Node + 'static>(&mut self, node: Arc<N>) -> Result<()> {
        self.ensure_idle("add a node")?;
        self.nodes.push(node);
        Ok(())
    }

    pub fn add_sink<S: SinkNode + 'static>(&mut self, sink: Arc<S>) -> Result<()> {
        self.ensure_idle("add a sink")?;
        self.sinks.push(sink);
        Ok(())
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    fn ensure_idle(&self, action: &str) -> Result<()> {
        let state = self.state();
        if state != GraphState::Idle {
            return Err(StreamError::Graph(format!(
                "cannot {} while {} is {:?}",
                action, self.shared.name, state
            )));
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if *state != GraphState::Idle {
                tracing::warn!("[{}] Graph already started", self.shared.name);
                return Err(StreamError::AlreadyRunning(self.shared.name.clone()));
            }
            *state = GraphState::Starting;
        }

        tracing::info!("[{}] Starting graph...", self.shared.name);
        self.shared.stopping.store(false, Ordering::Release);
        while self.events_rx.try_recv().is_ok() {}
        self.timer.reset();

        if let Err(e) = self.start_nodes() {
            *self.shared.state.lock() = GraphState::Idle;
            return Err(e);
        }

        let shared = Arc::clone(&self.shared);
        let sources = self.sources.clone();
        let events_rx = self.events_rx.clone();
        let spawned = std::thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || run_production_loop(shared, sources, events_rx));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("[{}] Failed to spawn production loop: {}", self.shared.name, e);
                self.stop_started(self.sources.len(), self.nodes.len(), self.sinks.len());
                *self.shared.state.lock() = GraphState::Idle;
                return Err(e.into());
            }
        };

        *self.shared.worker_thread.lock() = Some(handle.thread().id());
        self.worker = Some(handle);
        *self.shared.state.lock() = GraphState::Running;

        tracing::info!(
            "[{}] Graph started ({} sources, {} nodes, {} sinks)",
            self.shared.name,
            self.sources.len(),
            self.nodes.len(),
            self.sinks.len()
        );
        Ok(())
    }

    /// Starts sources, nodes and sinks, rolling back on the first failure.
    fn start_nodes(&self) -> Result<()> {
        for (i, source) in self.sources.iter().enumerate() {
            let mut source = source.lock();
            if let Err(e) = source.start() {
                let name = source.name().to_string();
                drop(source);
                return Err(self.start_failed(&name, e, i, 0, 0));
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if let Err(e) = node.start() {
                return Err(self.start_failed(node.name(), e, self.sources.len(), i, 0));
            }
        }

        for (i, sink) in self.sinks.iter().enumerate() {
            if let Err(e) = sink.start(&self.timer) {
                return Err(self.start_failed(
                    sink.name(),
                    e,
                    self.sources.len(),
                    self.nodes.len(),
                    i,
                ));
            }
        }

        Ok(())
    }

    fn start_failed(
        &self,
        name: &str,
        error: StreamError,
        sources: usize,
        nodes: usize,
        sinks: usize,
    ) -> StreamError {
        tracing::error!("[{}] {} failed to start: {}", self.shared.name, name, error);
        self.stop_started(sources, nodes, sinks);
        StreamError::node_start(name, error.to_string())
    }

    /// Stops the first `sinks` sinks, `nodes` nodes and `sources` sources, in
    /// reverse start order.
    fn stop_started(&self, sources: usize, nodes: usize, sinks: usize) {
        for sink in self.sinks[..sinks].iter().rev() {
            sink.stop();
        }
        for node in self.nodes[..nodes].iter().rev() {
            node.stop();
        }
        for source in self.sources[..sources].iter().rev() {
            source.lock().stop();
        }
    }

    fn drain_in_flight(&self) {
        let wait = Duration::from_millis(self.shared.config.stop_poll_interval_ms);
        while self.shared.in_flight_total() > 0 {
            let _ = self.events_rx.recv_timeout(wait);
        }
    }

    /// Stops the graph. Blocks until in-flight tasks have drained and the
    /// production loop has exited, then stops every node. Safe to call
    /// repeatedly.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            match *state {
                GraphState::Idle => {
                    tracing::debug!("[{}] Graph already stopped", self.shared.name);
                    return;
                }
                GraphState::Running | GraphState::Starting => *state = GraphState::Stopping,
                GraphState::Stopping => {}
            }
        }

        tracing::info!("[{}] Stopping graph...", self.shared.name);
        self.handle().request_stop();

        if self.shared.is_worker_thread() {
            tracing::error!(
                "[{}] stop() called from the graph's own thread; nodes stay started until stop() is called from another thread",
                self.shared.name
            );
            return;
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("[{}] Production loop panicked", self.shared.name);
            }
        }
        *self.shared.worker_thread.lock() = None;

        self.stop_started(self.sources.len(), self.nodes.len(), self.sinks.len());
        // Nodes may schedule flush work while stopping.
        self.drain_in_flight();

        *self.shared.state.lock() = GraphState::Idle;
        tracing::info!("[{}] Graph stopped", self.shared.name);
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        if self.shared.is_worker_thread() {
            panic!("[{}] a graph cannot be dropped from its own thread", self.shared.name);
        }

        // Counted before stop() drains them.
        let in_flight = self.shared.in_flight_total();
        self.stop();

        if in_flight > 0 {
            tracing::error!(
                "[{}] Dropped with {} tasks in flight",
                self.shared.name,
                in_flight
            );
            if !std::thread::panicking() {
                panic!(
                    "[{}] graph dropped with {} tasks in flight",
                    self.shared.name, in_flight
                );
            }
        }
    }
}

fn run_production_loop(
    shared: Arc<GraphShared>,
    sources: Vec<SharedSource>,
    events: Receiver<GraphEvent>,
) {
    let idle_wait = Duration::from_millis(shared.config.idle_poll_interval_ms);
    let stop_wait = Duration::from_millis(shared.config.stop_poll_interval_ms);

    tracing::info!("[{}] Production loop started", shared.name);

    loop {
        for _ in events.try_iter() {}

        if shared.stopping.load(Ordering::Acquire) {
            let in_flight = shared.in_flight_total();
            if in_flight == 0 {
                break;
            }
            tracing::trace!("[{}] Draining {} tasks", shared.name, in_flight);
            let _ = events.recv_timeout(stop_wait);
            continue;
        }

        if shared.admission_full() {
            let _ = events.recv_timeout(idle_wait);
            continue;
        }

        let mut produced = false;
        for source in &sources {
            produced |= source.lock().process();
        }

        if !produced {
            let _ = events.recv_timeout(idle_wait);
        }
    }

    tracing::info!("[{}] Production loop finished", shared.name);
}
