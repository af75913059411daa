//! The synthetic filesystem node set.
//!
//! Three node kinds, one closed enum:
//!
//! - [`SecretDir`] - the polymorphic workhorse. Probes the backend on every
//!   operation and behaves according to the observed [`SecretState`].
//! - [`StaticDir`] - an immutable, fully materialized tree of named
//!   children.
//! - [`StaticValue`] - an immutable byte buffer rendered as a read-only
//!   file.
//!
//! ## Design decisions
//!
//! - **No caching**: a `SecretDir` never memoizes its classification. The
//!   store's contents and the caller's authorization can change under the
//!   mount, so two sequential operations may legitimately observe different
//!   states.
//! - **Uniform descent**: a child found under a directory-like path is
//!   always another `SecretDir`, even when the child probe saw a readable
//!   secret. Materialization into the fixed field subtree happens one level
//!   down, when that node is itself operated on.
//! - **Read-only**: no node carries a writable mode bit and no operation
//!   mutates anything.

mod error;
mod secret_dir;
mod static_dir;
mod static_value;
mod types;

pub use error::{FsError, FsResult};
pub use secret_dir::{SecretDir, SecretState};
pub use static_dir::StaticDir;
pub use static_value::StaticValue;
pub use types::{DirEntry, FileAttr, FileType};

/// A node in the mounted tree.
#[derive(Debug, Clone)]
pub enum Node {
    Secret(SecretDir),
    Dir(StaticDir),
    Value(StaticValue),
}

impl Node {
    /// Attributes of this node. Probes the backend for secret directories.
    pub async fn attr(&self) -> FsResult<FileAttr> {
        match self {
            Node::Secret(dir) => dir.attr().await,
            Node::Dir(dir) => Ok(dir.attr()),
            Node::Value(value) => Ok(value.attr()),
        }
    }

    /// Resolve a child by name.
    pub async fn lookup(&self, name: &str) -> FsResult<Node> {
        match self {
            Node::Secret(dir) => dir.lookup(name).await,
            Node::Dir(dir) => dir.lookup(name),
            Node::Value(_) => Err(FsError::NotADirectory(name.to_string())),
        }
    }

    /// List every child of this node.
    pub async fn read_dir_all(&self) -> FsResult<Vec<DirEntry>> {
        match self {
            Node::Secret(dir) => dir.read_dir_all().await,
            Node::Dir(dir) => Ok(dir.read_dir_all()),
            Node::Value(_) => Err(FsError::NotADirectory(String::new())),
        }
    }

    /// Read file bytes. Only value nodes carry bytes.
    pub fn read(&self, offset: u64, size: u32) -> FsResult<Vec<u8>> {
        match self {
            Node::Value(value) => value.read(offset, size),
            Node::Secret(dir) => Err(FsError::IsADirectory(dir.lookup_path().to_string())),
            Node::Dir(_) => Err(FsError::IsADirectory(String::new())),
        }
    }

    /// True when the node presents as a directory to the kernel.
    pub fn is_dir(&self) -> bool {
        !matches!(self, Node::Value(_))
    }
}
