//! The `docker` command: serve the volume-plugin protocol on a Unix socket.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use vaultfs_core::VaultConfig;

use crate::cli::{Cli, DockerArgs};
use crate::docker::{server, DriverConfig, VolumeDriver};

pub async fn run(cli: &Cli, args: &DockerArgs) -> Result<()> {
    let config = VaultConfig::from_env();

    let driver = Arc::new(VolumeDriver::new(DriverConfig {
        state_root: args.state_root.clone(),
        vault: config,
        token: cli.token.clone(),
        auth_method: cli.auth_method()?,
    }));

    info!(
        state_root = %args.state_root.display(),
        socket = %args.socket.display(),
        "starting plugin server"
    );
    server::serve(driver, &args.socket).await
}
