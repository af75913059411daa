//! # vaultfs-core
//!
//! Core crate for vaultfs: the secret-store client, the authenticated
//! backend, and the synthetic filesystem node set.
//!
//! The moving parts, bottom up:
//!
//! - [`VaultClient`] - thin HTTP client for the store's logical API,
//!   configured from the standard `VAULT_*` environment variables.
//! - [`VaultBackend`] - wraps the client with token management and one
//!   configured [`AuthMethod`], and normalizes transport errors into the
//!   closed [`BackendError`] taxonomy. Filesystem nodes talk to it through
//!   the [`Logical`] trait.
//! - [`fs`] - the node set: [`SecretDir`] (probes the backend and behaves
//!   according to the observed [`SecretState`]), [`StaticDir`] and
//!   [`StaticValue`] (immutable materialized subtrees).

pub mod backend;
pub mod client;
pub mod error;
pub mod fs;
pub mod secret;

pub use backend::{AuthMethod, Logical, VaultBackend};
pub use client::{VaultClient, VaultConfig};
pub use error::{AuthError, BackendError, ClientError};
pub use fs::{
    DirEntry, FileAttr, FileType, FsError, FsResult, Node, SecretDir, SecretState, StaticDir,
    StaticValue,
};
pub use secret::{Secret, SecretAuth, WrapInfo};
