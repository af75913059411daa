//! Subcommand implementations.

pub mod docker;
pub mod mount;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};

/// Resolve when SIGINT or SIGTERM arrives.
pub async fn wait_for_shutdown() -> Result<()> {
    let mut term =
        signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;
    let mut int = signal(SignalKind::interrupt()).context("cannot install SIGINT handler")?;
    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
    Ok(())
}
