// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod node;
mod sink;
mod source;

pub use node::Node;
pub use sink::SinkNode;
pub use source::SourceNode;
