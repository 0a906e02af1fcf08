//! Paged Column Store
//!
//! One file per column. Page 0 is the header (magic, format version, type
//! tag, logical size, nullable flag, page size, row count, free-list
//! head); data pages pack fixed-size slots addressed by tuple id.
//!
//! A slot is one null marker byte followed by the value payload.
//! Fixed-width types use their physical size; strings serialise as
//! `len: i32` then bytes inside a fixed reserve. Columns whose slot
//! exceeds the default page capacity round their page size up to the next
//! power of two, so wide vectors stay single-page.
//!
//! Tuple ids are 64-bit, start at 1, and are assigned monotonically by
//! append; they are never reused.

use super::buffer::{BufferPool, PageId, DEFAULT_POOL_CAPACITY};
use super::error::{StorageError, StorageResult};
use super::page::{Page, PAGE_SIZE};
use crate::value::{ColumnType, Complex32, Complex64, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const MAGIC: &[u8; 4] = b"BURW";
const FORMAT_VERSION: u16 = 1;
/// Fixed payload reserve for string slots: 4 length bytes + content.
const STRING_CONTENT_BYTES: usize = 252;

// Header field offsets within page 0.
const H_MAGIC: usize = 0;
const H_VERSION: usize = 4;
const H_TYPE_TAG: usize = 6;
const H_NULLABLE: usize = 7;
const H_DIM: usize = 8;
const H_PAGE_SIZE: usize = 12;
const H_ROW_COUNT: usize = 16;
const H_FREE_LIST: usize = 24;
const HEADER_LEN: usize = 32;

/// On-disk store for one column of an entity.
pub struct ColumnStore {
    column_type: ColumnType,
    nullable: bool,
    slot_size: usize,
    slots_per_page: usize,
    pool: BufferPool,
    row_count: AtomicU64,
}

impl ColumnStore {
    /// Create a new column file, writing its header page.
    pub fn create(path: &Path, column_type: ColumnType, nullable: bool) -> StorageResult<Self> {
        let slot_size = slot_size(&column_type);
        let page_size = page_size_for(slot_size);
        let pool = BufferPool::open(path, page_size, DEFAULT_POOL_CAPACITY)?;

        let header = pool.allocate()?;
        debug_assert_eq!(header, 0);
        pool.with_page_mut(header, |p| {
            p.put_bytes(H_MAGIC, MAGIC)?;
            p.put_i16(H_VERSION, FORMAT_VERSION as i16)?;
            p.put_i8(H_TYPE_TAG, type_tag(&column_type) as i8)?;
            p.put_i8(H_NULLABLE, i8::from(nullable))?;
            p.put_i32(H_DIM, column_type.logical_size() as i32)?;
            p.put_i32(H_PAGE_SIZE, page_size as i32)?;
            p.put_u64(H_ROW_COUNT, 0)?;
            p.put_u64(H_FREE_LIST, 0)
        })?;
        pool.flush()?;

        Ok(ColumnStore {
            slots_per_page: page_size / slot_size,
            column_type,
            nullable,
            slot_size,
            pool,
            row_count: AtomicU64::new(0),
        })
    }

    /// Open an existing column file, validating its header.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut probe = vec![0u8; HEADER_LEN];
        File::open(path)?.read_exact(&mut probe)?;
        let header = Page::from_bytes(probe);

        if header.get_bytes(H_MAGIC, 4)? != MAGIC {
            return Err(StorageError::CorruptHeader("bad magic".into()));
        }
        let version = header.get_i16(H_VERSION)?;
        if version != FORMAT_VERSION as i16 {
            return Err(StorageError::CorruptHeader(format!(
                "unsupported format version {version}"
            )));
        }
        let tag = header.get_i8(H_TYPE_TAG)? as u8;
        let dim = header.get_i32(H_DIM)? as usize;
        let column_type = type_from_tag(tag, dim)
            .ok_or_else(|| StorageError::CorruptHeader(format!("unknown type tag {tag}")))?;
        let nullable = header.get_i8(H_NULLABLE)? != 0;
        let page_size = header.get_i32(H_PAGE_SIZE)? as usize;
        let row_count = header.get_u64(H_ROW_COUNT)?;

        let slot_size = slot_size(&column_type);
        if page_size < slot_size {
            return Err(StorageError::CorruptHeader(format!(
                "page size {page_size} below slot size {slot_size}"
            )));
        }

        let pool = BufferPool::open(path, page_size, DEFAULT_POOL_CAPACITY)?;
        Ok(ColumnStore {
            slots_per_page: page_size / slot_size,
            column_type,
            nullable,
            slot_size,
            pool,
            row_count: AtomicU64::new(row_count),
        })
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn row_count(&self) -> u64 {
        self.row_count.load(Ordering::Acquire)
    }

    /// Largest assigned tuple id (ids start at 1).
    pub fn max_tuple_id(&self) -> u64 {
        self.row_count()
    }

    /// Append a value, assigning the next tuple id.
    pub fn append(&self, value: &Value) -> StorageResult<u64> {
        let tuple_id = self.row_count.fetch_add(1, Ordering::AcqRel) + 1;
        let (pid, offset) = self.locate(tuple_id);
        while pid >= self.pool.page_count() {
            self.pool.allocate()?;
        }
        self.pool
            .with_page_mut(pid, |p| self.encode(p, offset, value))?;
        Ok(tuple_id)
    }

    /// Read the value stored under `tuple_id`.
    pub fn read(&self, tuple_id: u64) -> StorageResult<Value> {
        if tuple_id == 0 || tuple_id > self.row_count() {
            return Err(StorageError::TupleNotFound(tuple_id));
        }
        let (pid, offset) = self.locate(tuple_id);
        self.pool.with_page(pid, |p| self.decode(p, offset, tuple_id))
    }

    /// Persist the header and every dirty page.
    pub fn flush(&self) -> StorageResult<()> {
        self.pool
            .with_page_mut(0, |p| p.put_u64(H_ROW_COUNT, self.row_count()))?;
        self.pool.flush()
    }

    /// Data page and in-page byte offset of a tuple's slot.
    fn locate(&self, tuple_id: u64) -> (PageId, usize) {
        let index = tuple_id - 1;
        let page = 1 + index / self.slots_per_page as u64;
        let slot = (index % self.slots_per_page as u64) as usize;
        (page, slot * self.slot_size)
    }

    fn encode(&self, page: &mut Page, offset: usize, value: &Value) -> StorageResult<()> {
        if value.is_null() {
            page.put_i8(offset, 1)?;
            return Ok(());
        }
        page.put_i8(offset, 0)?;
        let base = offset + 1;
        match value {
            Value::Boolean(v) => page.put_i8(base, i8::from(*v)),
            Value::Byte(v) => page.put_i8(base, *v),
            Value::Short(v) => page.put_i16(base, *v),
            Value::Int(v) => page.put_i32(base, *v),
            Value::Long(v) => page.put_i64(base, *v),
            Value::Float(v) => page.put_f32(base, *v),
            Value::Double(v) => page.put_f64(base, *v),
            Value::String(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > STRING_CONTENT_BYTES {
                    return Err(StorageError::ValueTooLarge {
                        got: bytes.len(),
                        slot: STRING_CONTENT_BYTES,
                    });
                }
                page.put_i32(base, bytes.len() as i32)?;
                page.put_bytes(base + 4, bytes)
            }
            Value::Complex32(c) => {
                page.put_f32(base, c.re)?;
                page.put_f32(base + 4, c.im)
            }
            Value::Complex64(c) => {
                page.put_f64(base, c.re)?;
                page.put_f64(base + 8, c.im)
            }
            Value::ByteVector(v) => {
                for (i, x) in v.iter().enumerate() {
                    page.put_i8(base + i, *x)?;
                }
                Ok(())
            }
            Value::ShortVector(v) => {
                for (i, x) in v.iter().enumerate() {
                    page.put_i16(base + 2 * i, *x)?;
                }
                Ok(())
            }
            Value::IntVector(v) => {
                for (i, x) in v.iter().enumerate() {
                    page.put_i32(base + 4 * i, *x)?;
                }
                Ok(())
            }
            Value::LongVector(v) => {
                for (i, x) in v.iter().enumerate() {
                    page.put_i64(base + 8 * i, *x)?;
                }
                Ok(())
            }
            Value::FloatVector(v) => {
                for (i, x) in v.iter().enumerate() {
                    page.put_f32(base + 4 * i, *x)?;
                }
                Ok(())
            }
            Value::DoubleVector(v) => {
                for (i, x) in v.iter().enumerate() {
                    page.put_f64(base + 8 * i, *x)?;
                }
                Ok(())
            }
            Value::Complex32Vector(v) => {
                for (i, c) in v.iter().enumerate() {
                    page.put_f32(base + 8 * i, c.re)?;
                    page.put_f32(base + 8 * i + 4, c.im)?;
                }
                Ok(())
            }
            Value::Complex64Vector(v) => {
                for (i, c) in v.iter().enumerate() {
                    page.put_f64(base + 16 * i, c.re)?;
                    page.put_f64(base + 16 * i + 8, c.im)?;
                }
                Ok(())
            }
            Value::Null => unreachable!("handled above"),
        }
    }

    fn decode(&self, page: &Page, offset: usize, tuple_id: u64) -> StorageResult<Value> {
        if page.get_i8(offset)? != 0 {
            return Ok(Value::Null);
        }
        let base = offset + 1;
        let value = match &self.column_type {
            ColumnType::Boolean => Value::Boolean(page.get_i8(base)? != 0),
            ColumnType::Byte => Value::Byte(page.get_i8(base)?),
            ColumnType::Short => Value::Short(page.get_i16(base)?),
            ColumnType::Int => Value::Int(page.get_i32(base)?),
            ColumnType::Long => Value::Long(page.get_i64(base)?),
            ColumnType::Float => Value::Float(page.get_f32(base)?),
            ColumnType::Double => Value::Double(page.get_f64(base)?),
            ColumnType::String => {
                let len = page.get_i32(base)?;
                if len < 0 || len as usize > STRING_CONTENT_BYTES {
                    return Err(StorageError::CorruptValue {
                        tuple_id,
                        reason: format!("string length {len} out of range"),
                    });
                }
                let bytes = page.get_bytes(base + 4, len as usize)?;
                let s = std::str::from_utf8(bytes).map_err(|e| StorageError::CorruptValue {
                    tuple_id,
                    reason: e.to_string(),
                })?;
                Value::string(s)
            }
            ColumnType::Complex32 => {
                Value::Complex32(Complex32::new(page.get_f32(base)?, page.get_f32(base + 4)?))
            }
            ColumnType::Complex64 => {
                Value::Complex64(Complex64::new(page.get_f64(base)?, page.get_f64(base + 8)?))
            }
            ColumnType::ByteVector { dim } => {
                let mut v = Vec::with_capacity(*dim);
                for i in 0..*dim {
                    v.push(page.get_i8(base + i)?);
                }
                Value::ByteVector(Arc::new(v))
            }
            ColumnType::ShortVector { dim } => {
                let mut v = Vec::with_capacity(*dim);
                for i in 0..*dim {
                    v.push(page.get_i16(base + 2 * i)?);
                }
                Value::ShortVector(Arc::new(v))
            }
            ColumnType::IntVector { dim } => {
                let mut v = Vec::with_capacity(*dim);
                for i in 0..*dim {
                    v.push(page.get_i32(base + 4 * i)?);
                }
                Value::IntVector(Arc::new(v))
            }
            ColumnType::LongVector { dim } => {
                let mut v = Vec::with_capacity(*dim);
                for i in 0..*dim {
                    v.push(page.get_i64(base + 8 * i)?);
                }
                Value::LongVector(Arc::new(v))
            }
            ColumnType::FloatVector { dim } => {
                let mut v = Vec::with_capacity(*dim);
                for i in 0..*dim {
                    v.push(page.get_f32(base + 4 * i)?);
                }
                Value::FloatVector(Arc::new(v))
            }
            ColumnType::DoubleVector { dim } => {
                let mut v = Vec::with_capacity(*dim);
                for i in 0..*dim {
                    v.push(page.get_f64(base + 8 * i)?);
                }
                Value::DoubleVector(Arc::new(v))
            }
            ColumnType::Complex32Vector { dim } => {
                let mut v = Vec::with_capacity(*dim);
                for i in 0..*dim {
                    v.push(Complex32::new(
                        page.get_f32(base + 8 * i)?,
                        page.get_f32(base + 8 * i + 4)?,
                    ));
                }
                Value::Complex32Vector(Arc::new(v))
            }
            ColumnType::Complex64Vector { dim } => {
                let mut v = Vec::with_capacity(*dim);
                for i in 0..*dim {
                    v.push(Complex64::new(
                        page.get_f64(base + 16 * i)?,
                        page.get_f64(base + 16 * i + 8)?,
                    ));
                }
                Value::Complex64Vector(Arc::new(v))
            }
        };
        Ok(value)
    }
}

/// Slot size: one null marker byte plus the value payload.
fn slot_size(column_type: &ColumnType) -> usize {
    let payload = match column_type {
        ColumnType::String => 4 + STRING_CONTENT_BYTES,
        other => other.physical_size(),
    };
    1 + payload
}

/// Page size for a column: the default, or the next power of two above the
/// slot for wide vectors.
fn page_size_for(slot: usize) -> usize {
    if slot <= PAGE_SIZE {
        PAGE_SIZE
    } else {
        slot.next_power_of_two()
    }
}

fn type_tag(t: &ColumnType) -> u8 {
    match t {
        ColumnType::Boolean => 1,
        ColumnType::Byte => 2,
        ColumnType::Short => 3,
        ColumnType::Int => 4,
        ColumnType::Long => 5,
        ColumnType::Float => 6,
        ColumnType::Double => 7,
        ColumnType::String => 8,
        ColumnType::Complex32 => 9,
        ColumnType::Complex64 => 10,
        ColumnType::ByteVector { .. } => 11,
        ColumnType::ShortVector { .. } => 12,
        ColumnType::IntVector { .. } => 13,
        ColumnType::LongVector { .. } => 14,
        ColumnType::FloatVector { .. } => 15,
        ColumnType::DoubleVector { .. } => 16,
        ColumnType::Complex32Vector { .. } => 17,
        ColumnType::Complex64Vector { .. } => 18,
    }
}

fn type_from_tag(tag: u8, dim: usize) -> Option<ColumnType> {
    Some(match tag {
        1 => ColumnType::Boolean,
        2 => ColumnType::Byte,
        3 => ColumnType::Short,
        4 => ColumnType::Int,
        5 => ColumnType::Long,
        6 => ColumnType::Float,
        7 => ColumnType::Double,
        8 => ColumnType::String,
        9 => ColumnType::Complex32,
        10 => ColumnType::Complex64,
        11 => ColumnType::ByteVector { dim },
        12 => ColumnType::ShortVector { dim },
        13 => ColumnType::IntVector { dim },
        14 => ColumnType::LongVector { dim },
        15 => ColumnType::FloatVector { dim },
        16 => ColumnType::DoubleVector { dim },
        17 => ColumnType::Complex32Vector { dim },
        18 => ColumnType::Complex64Vector { dim },
        _ => return None,
    })
}
