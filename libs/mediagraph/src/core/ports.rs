// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Typed output ports.
//!
//! A node exposes one [`OutputPort`] per output stream; downstream nodes
//! subscribe while the graph is being wired. Emitting calls every subscriber
//! directly on the emitting thread.

use std::sync::Arc;

use parking_lot::RwLock;

type Subscriber<T> = Arc<dyn Fn(T) + Send + Sync>;

pub struct OutputPort<T> {
    subscribers: RwLock<Vec<Subscriber<T>>>,
}

impl<T: Clone + Send + 'static> OutputPort<T> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn connect(&self, subscriber: impl Fn(T) + Send + Sync + 'static) {
        self.subscribers.write().push(Arc::new(subscriber));
    }

    /// Routes this port into `method` of a shared node.
    pub fn connect_node<N>(&self, node: &Arc<N>, method: fn(&N, T))
    where
        N: Send + Sync + 'static,
    {
        let node = Arc::clone(node);
        self.connect(move |value| method(&node, value));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_connected(&self) -> bool {
        self.subscriber_count() > 0
    }

    pub fn disconnect_all(&self) {
        self.subscribers.write().clear();
    }

    /// Delivers `value` to every subscriber. Clones for all but the last,
    /// which receives the value itself.
    pub fn emit(&self, value: T) {
        // Snapshot so subscribers may connect further ports while emitting.
        let subscribers = self.subscribers.read().clone();
        let Some((last, rest)) = subscribers.split_last() else {
            return;
        };
        for subscriber in rest {
            subscriber(value.clone());
        }
        last(value);
    }
}

impl<T: Clone + Send + 'static> Default for OutputPort<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_fan_out() {
        let port = OutputPort::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in [10, 20] {
            let seen = Arc::clone(&seen);
            port.connect(move |v| seen.lock().push(v + tag));
        }
        port.emit(1);
        port.emit(2);
        assert_eq!(*seen.lock(), vec![11, 21, 12, 22]);
    }

    #[test]
    fn test_unconnected_emit_is_dropped() {
        let port = OutputPort::<String>::new();
        assert!(!port.is_connected());
        port.emit("nobody".to_string());
    }

    #[test]
    fn test_connect_node() {
        struct Collector(Mutex<Vec<u8>>);
        impl Collector {
            fn input(&self, v: u8) {
                self.0.lock().push(v);
            }
        }

        let port = OutputPort::new();
        let collector = Arc::new(Collector(Mutex::new(Vec::new())));
        port.connect_node(&collector, Collector::input);
        port.emit(5u8);
        assert_eq!(*collector.0.lock(), vec![5]);
        assert_eq!(port.subscriber_count(), 1);

        port.disconnect_all();
        port.emit(6u8);
        assert_eq!(*collector.0.lock(), vec![5]);
    }
}
