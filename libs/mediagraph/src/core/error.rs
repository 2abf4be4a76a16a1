// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Graph is already running: {0}")]
    AlreadyRunning(String),

    #[error("Node '{node}' failed to start: {reason}")]
    NodeStart { node: String, reason: String },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StreamError {
    pub fn node_start(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NodeStart {
            node: node.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
