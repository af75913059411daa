//! vaultfs binary.
//!
//! Two front-ends over the same filesystem engine: `mount` attaches a vault
//! tree directly at a mountpoint, `docker` serves the volume-plugin
//! protocol and mounts a subtree per container request.

mod cli;
mod commands;
mod docker;

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    // Required before any TLS operation with rustls 0.23+.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    lock_memory();

    let result = match &cli.command {
        Commands::Mount(args) => commands::mount::run(&cli, args).await,
        Commands::Docker(args) => commands::docker::run(&cli, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Keep secret bytes out of swap. Failure is survivable and merely logged.
fn lock_memory() {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    match mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        Ok(()) => debug!("locked process memory"),
        Err(err) => warn!(%err, "could not mlockall to prevent swapping secrets"),
    }
}
