//! POI-Scout: request → optimized search → distilled skills → decision tree.
//!
//! [`pipeline`] is the library entry point; [`run_cli`] backs the `poiscout`
//! binary.

mod cli;
mod commands;
pub mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use poiscout_core::observability::{init_tracing, set_audit_path, TracingMode};

pub use pipeline::{Capabilities, Pipeline, PipelineError, PipelineOptions, SearchReport};

/// Parse arguments, set up tracing and the audit log, and dispatch.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let mode = if matches!(cli.command, Commands::Select { .. }) {
        TracingMode::Interactive
    } else {
        TracingMode::Default
    };
    init_tracing(mode);
    if let Some(path) = &cli.audit_log {
        set_audit_path(path);
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(commands::dispatch(cli))
}
