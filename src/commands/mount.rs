//! The `mount` command: attach a vault tree at a mountpoint and serve until
//! interrupted.

use anyhow::{Context, Result};
use tracing::info;

use vaultfs_core::VaultConfig;
use vaultfs_fuse::VaultFs;

use crate::cli::{Cli, MountArgs};
use crate::commands::wait_for_shutdown;

pub async fn run(cli: &Cli, args: &MountArgs) -> Result<()> {
    let config = VaultConfig::from_env();
    info!(address = %config.address, "creating FUSE client for vault server");

    let fs = VaultFs::new(
        &config,
        &args.mountpoint,
        args.root.clone(),
        cli.token.clone(),
        cli.auth_method()?,
    )
    .await
    .context("error creating filesystem")?;

    fs.mount().context("could not mount")?;

    wait_for_shutdown().await?;
    info!("stopping");
    fs.unmount().context("could not unmount cleanly")?;
    Ok(())
}
