//! Binary crate for the `weather-tool` command-line host.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Printing tool definitions and invocation envelopes as JSON

use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod config;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cmd = cli::Cli::parse();
    init_logging(&cmd.log_level);
    cmd.run().await
}

/// Logs go to stderr so stdout stays machine-readable JSON.
fn init_logging(level: &str) {
    let filter = log_filter(level, std::env::var("RUST_LOG").ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// `RUST_LOG` directives when present, otherwise the `--log-level` value.
fn log_filter(level: &str, rust_log: Option<&str>) -> EnvFilter {
    let level = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::WARN,
    };

    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(rust_log.unwrap_or_default())
}
