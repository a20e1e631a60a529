//! HyprDoc CLI binary.
//!
//! Usage:
//!   hyprdoc lease.json new --title "Lease"
//!   hyprdoc lease.json insert signature
//!   hyprdoc lease.json show --diff
//!
//! Logs go to stderr; set RUST_LOG=debug for per-operation detail.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use hyprdoc_cli::{Cli, run};

fn main() -> Result<()> {
    // Logs to stderr so stdout stays pipeable
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let output = run(cli)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
