// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod config;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mediagraph::MediaGraphConfig;

/// Loads `path`, or `./mediagraph.yaml` when present, or the defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<MediaGraphConfig> {
    let config = match path {
        Some(path) => MediaGraphConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MediaGraphConfig::load_or_default(Path::new(MediaGraphConfig::FILE_NAME)),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
