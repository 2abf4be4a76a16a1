// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod clocks;
pub mod codec;
pub mod config;
pub mod error;
pub mod frames;
pub mod graph;
pub mod nodes;
pub mod ports;
pub mod prelude;
pub mod registry;
pub mod scheduling;
pub mod time;
pub mod traits;

pub use clocks::*;
pub use codec::*;
pub use config::*;
pub use error::*;
pub use frames::*;
pub use graph::*;
pub use nodes::*;
pub use ports::OutputPort;
pub use registry::BackendRegistry;
pub use scheduling::*;
pub use time::*;
pub use traits::*;
