//! Fixed-Size Page
//!
//! The unit of disk I/O: a fixed-capacity byte region with bounds-checked
//! little-endian accessors for every numeric width plus byte slices.
//!
//! Ownership belongs to the buffer pool, which lends a page to one writer
//! or many readers at a time; the page itself only enforces bounds.

use super::error::{StorageError, StorageResult};

/// Default page capacity in bytes.
pub const PAGE_SIZE: usize = 4096;

/// A fixed-size byte page.
///
/// All multi-byte accessors are little-endian regardless of platform, so
/// files move between architectures bit-exactly.
#[derive(Debug, Clone)]
pub struct Page {
    data: Box<[u8]>,
    dirty: bool,
}

macro_rules! page_accessors {
    ($get:ident, $put:ident, $ty:ty, $width:expr) => {
        /// Bounds-checked little-endian read.
        pub fn $get(&self, offset: usize) -> StorageResult<$ty> {
            let end = self.checked_end(offset, $width)?;
            let mut buf = [0u8; $width];
            buf.copy_from_slice(&self.data[offset..end]);
            Ok(<$ty>::from_le_bytes(buf))
        }

        /// Bounds-checked little-endian write.
        pub fn $put(&mut self, offset: usize, value: $ty) -> StorageResult<()> {
            let end = self.checked_end(offset, $width)?;
            self.data[offset..end].copy_from_slice(&value.to_le_bytes());
            self.dirty = true;
            Ok(())
        }
    };
}

impl Page {
    /// A zeroed page of the given capacity.
    pub fn new(capacity: usize) -> Self {
        Page {
            data: vec![0u8; capacity].into_boxed_slice(),
            dirty: false,
        }
    }

    /// A page wrapping bytes read from disk.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Page {
            data: data.into_boxed_slice(),
            dirty: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag after the pool has written the page back.
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn checked_end(&self, offset: usize, width: usize) -> StorageResult<usize> {
        match offset.checked_add(width) {
            Some(end) if end <= self.data.len() => Ok(end),
            _ => Err(StorageError::OutOfRange {
                offset,
                width,
                capacity: self.data.len(),
            }),
        }
    }

    page_accessors!(get_i8, put_i8, i8, 1);
    page_accessors!(get_i16, put_i16, i16, 2);
    page_accessors!(get_i32, put_i32, i32, 4);
    page_accessors!(get_i64, put_i64, i64, 8);
    page_accessors!(get_u64, put_u64, u64, 8);
    page_accessors!(get_f32, put_f32, f32, 4);
    page_accessors!(get_f64, put_f64, f64, 8);

    /// Read `len` bytes starting at `offset`.
    pub fn get_bytes(&self, offset: usize, len: usize) -> StorageResult<&[u8]> {
        let end = self.checked_end(offset, len)?;
        Ok(&self.data[offset..end])
    }

    /// Write a byte slice at `offset`. A slice longer than the remaining
    /// capacity fails with the overflow kind and leaves the page unchanged.
    pub fn put_bytes(&mut self, offset: usize, bytes: &[u8]) -> StorageResult<()> {
        let end = match offset.checked_add(bytes.len()) {
            Some(end) if end <= self.data.len() => end,
            _ => {
                return Err(StorageError::Overflow {
                    offset,
                    len: bytes.len(),
                    capacity: self.data.len(),
                })
            }
        };
        self.data[offset..end].copy_from_slice(bytes);
        self.dirty = true;
        Ok(())
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(PAGE_SIZE)
    }
}
