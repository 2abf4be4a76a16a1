// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Print the effective configuration.
pub fn show(path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(path)?;
    let yaml = config
        .to_yaml_string()
        .context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
