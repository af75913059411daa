//! # vaultfs-fuse
//!
//! The filesystem host: owns the authenticated backend and the live kernel
//! session, and pins a [`SecretDir`] root at the configured prefix.
//!
//! [`VaultFs::new`] authenticates eagerly so a bad credential fails the
//! mount immediately instead of surfacing as I/O errors later. [`mount`]
//! spawns a background FUSE session; [`unmount`] asks the kernel to release
//! the mountpoint and waits for the session to drain.
//!
//! [`mount`]: VaultFs::mount
//! [`unmount`]: VaultFs::unmount

mod session;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fuser::MountOption;
use thiserror::Error;
use tracing::{debug, info};

use vaultfs_core::{
    AuthMethod, BackendError, ClientError, FsError, Logical, Node, SecretDir, VaultBackend,
    VaultClient, VaultConfig,
};

/// Identifier presented to the kernel as the filesystem name.
const FS_NAME: &str = "vault";

/// Errors from the mount lifecycle.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("cannot mount at {}", .mountpoint.display())]
    Mount {
        mountpoint: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("already mounted at {}", .0.display())]
    AlreadyMounted(PathBuf),

    #[error("not mounted")]
    NotMounted,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Node(#[from] FsError),
}

/// A mounted (or mountable) vault filesystem.
pub struct VaultFs {
    backend: Arc<VaultBackend>,
    root: String,
    mountpoint: PathBuf,
    handle: tokio::runtime::Handle,
    session: Mutex<Option<fuser::BackgroundSession>>,
}

impl std::fmt::Debug for VaultFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultFs")
            .field("root", &self.root)
            .field("mountpoint", &self.mountpoint)
            .finish()
    }
}

impl VaultFs {
    /// Build the backend and authenticate it.
    ///
    /// With a supplied token this only stores it; otherwise the configured
    /// auth method logs in now, so bad credentials fail fast.
    pub async fn new(
        config: &VaultConfig,
        mountpoint: impl Into<PathBuf>,
        root: impl Into<String>,
        token: Option<String>,
        auth_method: AuthMethod,
    ) -> Result<Self, MountError> {
        let client = VaultClient::new(config)?;
        let backend = VaultBackend::new(client, token, auth_method);
        backend.auth().await?;

        Ok(Self {
            backend: Arc::new(backend),
            root: root.into(),
            mountpoint: mountpoint.into(),
            handle: tokio::runtime::Handle::current(),
            session: Mutex::new(None),
        })
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    /// A fresh root node at the configured prefix.
    pub fn root(&self) -> Result<SecretDir, FsError> {
        let backend: Arc<dyn Logical> = self.backend.clone();
        SecretDir::new(backend, self.root.clone())
    }

    /// Connect to the kernel and start serving in the background.
    pub fn mount(&self) -> Result<(), MountError> {
        let mut slot = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(MountError::AlreadyMounted(self.mountpoint.clone()));
        }

        let fs = session::VaultFuse::new(Node::Secret(self.root()?), self.handle.clone());
        let options = [
            MountOption::RO,
            MountOption::FSName(FS_NAME.to_string()),
            MountOption::DefaultPermissions,
        ];
        let session = fuser::spawn_mount2(fs, &self.mountpoint, &options).map_err(|source| {
            MountError::Mount {
                mountpoint: self.mountpoint.clone(),
                source,
            }
        })?;

        info!(mountpoint = %self.mountpoint.display(), root = %self.root, "mounted");
        *slot = Some(session);
        Ok(())
    }

    /// Ask the kernel to release the mountpoint and wait for the session to
    /// finish.
    pub fn unmount(&self) -> Result<(), MountError> {
        let session = self
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(MountError::NotMounted)?;
        debug!(mountpoint = %self.mountpoint.display(), "unmounting");
        session.join();
        info!(mountpoint = %self.mountpoint.display(), "unmounted");
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
