//! Volume registry: one filesystem host per mounted volume.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use vaultfs_core::{AuthMethod, VaultConfig};
use vaultfs_fuse::{MountError, VaultFs};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("volume name must not be empty")]
    EmptyName,

    #[error("no such volume: {0}")]
    NotFound(String),

    #[error("cannot create mountpoint {}", .path.display())]
    Mountpoint {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Mount(#[from] MountError),
}

/// Settings shared by every volume this driver mounts.
#[derive(Debug)]
pub struct DriverConfig {
    /// Mountpoints are allocated as `<state_root>/<volume-name>`.
    pub state_root: PathBuf,
    pub vault: VaultConfig,
    pub token: Option<String>,
    pub auth_method: AuthMethod,
}

struct MountedVolume {
    fs: VaultFs,
}

/// The volume-plugin driver. Volume names double as the root prefix in the
/// store: mounting a volume named `secret` exposes the `secret/` subtree.
pub struct VolumeDriver {
    config: DriverConfig,
    volumes: Mutex<HashMap<String, MountedVolume>>,
}

impl VolumeDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            volumes: Mutex::new(HashMap::new()),
        }
    }

    /// `Create` only validates; the filesystem comes up on `Mount`.
    pub fn create(&self, name: &str) -> Result<(), DriverError> {
        if name.is_empty() {
            return Err(DriverError::EmptyName);
        }
        Ok(())
    }

    /// Mount the volume and return its mountpoint. Mounting an
    /// already-mounted volume returns the existing mountpoint.
    pub async fn mount(&self, name: &str) -> Result<PathBuf, DriverError> {
        if name.is_empty() {
            return Err(DriverError::EmptyName);
        }

        let mut volumes = self.volumes.lock().await;
        if let Some(volume) = volumes.get(name) {
            return Ok(volume.fs.mountpoint().to_path_buf());
        }

        let mountpoint = self.config.state_root.join(name);
        tokio::fs::create_dir_all(&mountpoint)
            .await
            .map_err(|source| DriverError::Mountpoint {
                path: mountpoint.clone(),
                source,
            })?;

        let fs = VaultFs::new(
            &self.config.vault,
            &mountpoint,
            name.to_string(),
            self.config.token.clone(),
            self.config.auth_method.clone(),
        )
        .await?;
        fs.mount()?;

        info!(volume = name, mountpoint = %mountpoint.display(), "mounted volume");
        volumes.insert(name.to_string(), MountedVolume { fs });
        Ok(mountpoint)
    }

    /// Tear down the volume's filesystem host.
    pub async fn unmount(&self, name: &str) -> Result<(), DriverError> {
        let volume = self
            .volumes
            .lock()
            .await
            .remove(name)
            .ok_or_else(|| DriverError::NotFound(name.to_string()))?;
        volume.fs.unmount()?;
        info!(volume = name, "unmounted volume");
        Ok(())
    }

    /// Mountpoint of a mounted volume.
    pub async fn path(&self, name: &str) -> Option<PathBuf> {
        self.volumes
            .lock()
            .await
            .get(name)
            .map(|v| v.fs.mountpoint().to_path_buf())
    }

    /// All mounted volumes as (name, mountpoint) pairs.
    pub async fn list(&self) -> Vec<(String, PathBuf)> {
        let mut volumes: Vec<_> = self
            .volumes
            .lock()
            .await
            .iter()
            .map(|(name, v)| (name.clone(), v.fs.mountpoint().to_path_buf()))
            .collect();
        volumes.sort_by(|a, b| a.0.cmp(&b.0));
        volumes
    }

    /// `Remove` drops a volume, unmounting it first if needed. A volume
    /// that was never mounted is fine to remove.
    pub async fn remove(&self, name: &str) -> Result<(), DriverError> {
        match self.unmount(name).await {
            Ok(()) | Err(DriverError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Drain every volume. Each teardown error is collected; one volume
    /// failing does not stop the others.
    pub async fn stop(&self) -> Vec<(String, DriverError)> {
        let volumes: Vec<String> = self.volumes.lock().await.keys().cloned().collect();
        let mut failures = Vec::new();
        for name in volumes {
            if let Err(err) = self.unmount(&name).await {
                warn!(volume = %name, error = %err, "teardown failed");
                failures.push((name, err));
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_driver() -> VolumeDriver {
        VolumeDriver::new(DriverConfig {
            state_root: PathBuf::from("/tmp/vaultfs-volumes"),
            vault: VaultConfig::default(),
            token: Some("the-token".to_string()),
            auth_method: AuthMethod::Cert,
        })
    }

    #[test]
    fn create_rejects_empty_names() {
        let driver = test_driver();
        assert!(matches!(driver.create(""), Err(DriverError::EmptyName)));
        assert!(driver.create("secret").is_ok());
    }

    #[tokio::test]
    async fn unknown_volume_reports_not_found() {
        let driver = test_driver();
        assert!(driver.path("missing").await.is_none());
        assert!(matches!(
            driver.unmount("missing").await,
            Err(DriverError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_tolerates_never_mounted_volumes() {
        let driver = test_driver();
        assert!(driver.remove("never-mounted").await.is_ok());
    }

    #[tokio::test]
    async fn stop_with_no_volumes_collects_nothing() {
        let driver = test_driver();
        assert!(driver.list().await.is_empty());
        assert!(driver.stop().await.is_empty());
    }
}
