//! Storage Error Types

use std::io;
use thiserror::Error;

/// Storage layer errors.
///
/// The two bounds kinds are deliberately distinct so a caller can tell a
/// too-large point access (`OutOfRange`) from a too-long slice write
/// (`Overflow`).
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Point access past the end of a page
    #[error("page access out of range: offset {offset} + width {width} exceeds capacity {capacity}")]
    OutOfRange {
        offset: usize,
        width: usize,
        capacity: usize,
    },

    /// Slice write longer than the remaining page capacity
    #[error("page overflow: {len} bytes do not fit at offset {offset} of a {capacity}-byte page")]
    Overflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// Page id beyond the end of the backing file
    #[error("page {0} does not exist")]
    PageNotFound(u64),

    /// Column file header failed validation
    #[error("corrupt column header: {0}")]
    CorruptHeader(String),

    /// Stored value failed to decode
    #[error("corrupt value at tuple {tuple_id}: {reason}")]
    CorruptValue { tuple_id: u64, reason: String },

    /// Tuple id outside the stored range
    #[error("tuple {0} does not exist")]
    TupleNotFound(u64),

    /// A value too large for the column's slot layout
    #[error("value of {got} bytes exceeds the column slot of {slot} bytes")]
    ValueTooLarge { got: usize, slot: usize },

    /// Catalog metadata (de)serialization error
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
