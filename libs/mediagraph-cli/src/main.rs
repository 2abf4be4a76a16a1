// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! mediagraph CLI
//!
//! Runs synthetic pipelines through the graph engine and prints what reached
//! the sink.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod synthetic;

#[derive(Parser)]
#[command(name = "mediagraph")]
#[command(author, version, about = "Media graph runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic audio/video pipeline
    Run {
        /// Configuration file (default: ./mediagraph.yaml if present)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// How long to run, in seconds
        #[arg(long, default_value = "5")]
        seconds: u64,

        /// Write a scheduler timeline (SVG) to this path
        #[arg(long, value_name = "SVG")]
        trace: Option<PathBuf>,

        /// Log filter used when RUST_LOG is not set
        #[arg(long, default_value = "info")]
        log_level: String,
    },

    /// Print the effective configuration as YAML
    Config {
        /// Configuration file (default: ./mediagraph.yaml if present)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            seconds,
            trace,
            log_level,
        } => {
            init_tracing(&log_level);
            commands::run::run(config, seconds, trace)?;
        }
        Commands::Config { config } => {
            init_tracing("warn");
            commands::config::show(config)?;
        }
    }

    Ok(())
}
