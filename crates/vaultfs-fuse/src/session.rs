//! Bridge between the kernel's inode-based callback protocol and the
//! path-based async node set.
//!
//! The kernel speaks inodes; nodes are values. The inode table hands out an
//! inode per successful lookup and drops the node when the kernel sends the
//! matching `forget`. Entry and attribute TTLs are zero so the kernel
//! re-asks every time, matching the no-caching contract of the secret
//! directory nodes.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, Request,
};
use libc::c_int;
use tracing::{debug, warn};

use vaultfs_core::{FileAttr, FileType, FsError, Node};

/// Root inode number, fixed by the FUSE protocol.
const ROOT_INO: u64 = 1;

/// Zero TTL: never let the kernel cache entries or attributes.
const TTL: Duration = Duration::ZERO;

struct InodeEntry {
    node: Node,
    /// Outstanding kernel references; decremented by `forget`.
    lookups: u64,
}

/// Maps live inodes to nodes.
pub(crate) struct InodeTable {
    entries: HashMap<u64, InodeEntry>,
    next: u64,
}

impl InodeTable {
    pub(crate) fn new(root: Node) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            ROOT_INO,
            InodeEntry {
                node: root,
                lookups: 1,
            },
        );
        Self {
            entries,
            next: ROOT_INO + 1,
        }
    }

    pub(crate) fn get(&self, ino: u64) -> Option<&Node> {
        self.entries.get(&ino).map(|e| &e.node)
    }

    /// Register a freshly looked-up node under a new inode.
    pub(crate) fn insert(&mut self, node: Node) -> u64 {
        let ino = self.next;
        self.next += 1;
        self.entries.insert(ino, InodeEntry { node, lookups: 1 });
        ino
    }

    /// Drop `nlookup` kernel references; the node is released when none
    /// remain. The root is never released.
    pub(crate) fn forget(&mut self, ino: u64, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }
        if let Some(entry) = self.entries.get_mut(&ino) {
            entry.lookups = entry.lookups.saturating_sub(nlookup);
            if entry.lookups == 0 {
                self.entries.remove(&ino);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The fuser-facing filesystem.
pub(crate) struct VaultFuse {
    inodes: InodeTable,
    /// Runtime handle used to drive async node operations from the
    /// synchronous callback thread.
    handle: tokio::runtime::Handle,
}

impl VaultFuse {
    pub(crate) fn new(root: Node, handle: tokio::runtime::Handle) -> Self {
        Self {
            inodes: InodeTable::new(root),
            handle,
        }
    }
}

/// Map a node error onto the errno the kernel sees.
fn errno(err: &FsError) -> c_int {
    match err {
        FsError::NotFound(_) => libc::ENOENT,
        FsError::NotADirectory(_) => libc::ENOTDIR,
        FsError::IsADirectory(_) => libc::EISDIR,
        FsError::OffsetOutOfRange { .. } => libc::EINVAL,
        FsError::InvalidValue(_) | FsError::BackendUnavailable => libc::EIO,
    }
}

/// Render node attributes for the kernel. Times are fixed at the epoch; the
/// synthetic tree has no meaningful timestamps.
fn fuse_attr(ino: u64, attr: &FileAttr) -> fuser::FileAttr {
    let kind = match attr.kind {
        FileType::File => fuser::FileType::RegularFile,
        FileType::Directory => fuser::FileType::Directory,
    };
    fuser::FileAttr {
        ino,
        size: attr.size,
        blocks: 0,
        atime: SystemTime::UNIX_EPOCH,
        mtime: SystemTime::UNIX_EPOCH,
        ctime: SystemTime::UNIX_EPOCH,
        crtime: SystemTime::UNIX_EPOCH,
        kind,
        perm: attr.perm as u16,
        nlink: if attr.is_dir() { 2 } else { 1 },
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

impl Filesystem for VaultFuse {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(parent_node) = self.inodes.get(parent).cloned() else {
            warn!(parent, "lookup against unknown inode");
            reply.error(libc::ENOENT);
            return;
        };

        let name = name.to_string();
        let result = self.handle.block_on(async {
            let child = parent_node.lookup(&name).await?;
            let attr = child.attr().await?;
            Ok::<_, FsError>((child, attr))
        });

        match result {
            Ok((child, attr)) => {
                let ino = self.inodes.insert(child);
                reply.entry(&TTL, &fuse_attr(ino, &attr), 0);
            }
            Err(err) => {
                debug!(parent, name = %name, error = %err, "lookup failed");
                reply.error(errno(&err));
            }
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(node) = self.inodes.get(ino).cloned() else {
            reply.error(libc::ENOENT);
            return;
        };

        match self.handle.block_on(node.attr()) {
            Ok(attr) => reply.attr(&TTL, &fuse_attr(ino, &attr)),
            Err(err) => {
                debug!(ino, error = %err, "getattr failed");
                reply.error(errno(&err));
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let Some(node) = self.inodes.get(ino).cloned() else {
            reply.error(libc::ENOENT);
            return;
        };

        let entries = match self.handle.block_on(node.read_dir_all()) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(ino, error = %err, "readdir failed");
                reply.error(errno(&err));
                return;
            }
        };

        for (i, entry) in entries.iter().enumerate().skip(offset as usize) {
            let kind = match entry.kind {
                FileType::File => fuser::FileType::RegularFile,
                FileType::Directory => fuser::FileType::Directory,
            };
            // Inode 0 in the dirent: numbers are not stable here and the
            // kernel resolves real inodes through lookup.
            if reply.add(0, (i + 1) as i64, kind, &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let Some(node) = self.inodes.get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        match node.read(offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(err) => {
                debug!(ino, offset, size, error = %err, "read failed");
                reply.error(errno(&err));
            }
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }
}
