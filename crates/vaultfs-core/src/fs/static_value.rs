//! A file which only ever serves a fixed value.

use std::sync::Arc;

use super::error::{FsError, FsResult};
use super::types::FileAttr;

/// Immutable byte buffer rendered as a read-only file.
///
/// Clones share the underlying buffer, so repeated lookups of the same
/// static tree hand out equivalent nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticValue {
    value: Arc<[u8]>,
}

impl StaticValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into().into_bytes().into(),
        }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Regular file, read-only, size equal to the buffer length.
    pub fn attr(&self) -> FileAttr {
        FileAttr::file(self.value.len() as u64, 0o440)
    }

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// `offset == len` yields an empty slice; `offset > len` is an error.
    pub fn read(&self, offset: u64, size: u32) -> FsResult<Vec<u8>> {
        let len = self.value.len() as u64;
        if offset > len {
            return Err(FsError::OffsetOutOfRange { offset, len });
        }
        let start = offset as usize;
        let end = start.saturating_add(size as usize).min(self.value.len());
        Ok(self.value[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_read_returns_value() {
        let value = StaticValue::new("s3cret");
        assert_eq!(value.read(0, 6).unwrap(), b"s3cret");
        assert_eq!(value.attr().size, 6);
    }

    #[test]
    fn partial_reads() {
        let value = StaticValue::new("hello world");
        assert_eq!(value.read(6, 5).unwrap(), b"world");
        assert_eq!(value.read(0, 5).unwrap(), b"hello");
        // Oversized request is clamped to the end.
        assert_eq!(value.read(6, 100).unwrap(), b"world");
    }

    #[test]
    fn read_at_end_is_empty_not_error() {
        let value = StaticValue::new("abc");
        assert_eq!(value.read(3, 10).unwrap(), b"");
    }

    #[test]
    fn read_past_end_fails() {
        let value = StaticValue::new("abc");
        assert!(matches!(
            value.read(4, 1),
            Err(FsError::OffsetOutOfRange { offset: 4, len: 3 })
        ));
    }

    #[test]
    fn empty_value_reads_empty() {
        let value = StaticValue::new("");
        assert!(value.is_empty());
        assert_eq!(value.read(0, 16).unwrap(), b"");
        assert_eq!(value.attr().size, 0);
    }
}
