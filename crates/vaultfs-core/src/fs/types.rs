//! Attribute and directory-entry types the kernel adapter consumes.

/// Node kind as the kernel sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// File attributes.
///
/// Ownership is always root and no mode ever carries a write bit; the
/// mounted tree is read-only by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttr {
    /// Size in bytes (0 for directories).
    pub size: u64,
    pub kind: FileType,
    /// Unix permissions (e.g. `0o440`).
    pub perm: u32,
    pub uid: u32,
    pub gid: u32,
}

impl FileAttr {
    pub fn file(size: u64, perm: u32) -> Self {
        Self {
            size,
            kind: FileType::File,
            perm,
            uid: 0,
            gid: 0,
        }
    }

    pub fn directory(perm: u32) -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            perm,
            uid: 0,
            gid: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// A single directory listing entry.
///
/// Inode numbers are not part of the model; the kernel adapter emits 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not a full path).
    pub name: String,
    pub kind: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_constructors() {
        let file = FileAttr::file(11, 0o440);
        assert!(file.kind.is_file());
        assert_eq!(file.size, 11);
        assert_eq!(file.perm, 0o440);
        assert_eq!((file.uid, file.gid), (0, 0));

        let dir = FileAttr::directory(0o555);
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
    }

    #[test]
    fn no_mode_carries_write_bits() {
        for attr in [
            FileAttr::file(0, 0o440),
            FileAttr::file(0, 0o444),
            FileAttr::directory(0o555),
            FileAttr::directory(0o111),
        ] {
            assert_eq!(attr.perm & 0o222, 0);
        }
    }

    #[test]
    fn dir_entry_constructors() {
        assert!(DirEntry::file("lease_id").kind.is_file());
        assert!(DirEntry::directory("data").kind.is_dir());
    }
}
