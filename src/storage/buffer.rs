//! Buffer Pool
//!
//! Owns the pages of one backing file by page id (file offset divided by
//! page size) and lends them out for reading or writing. Borrows are
//! closure-scoped so release happens on every exit path; many readers may
//! share a page while a writer has it exclusively.
//!
//! Misses read the page from disk. A bounded number of frames stay
//! resident; once full, the oldest unborrowed frame is written back (if
//! dirty) and dropped.

use super::error::{StorageError, StorageResult};
use super::page::Page;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// File-offset page identity.
pub type PageId = u64;

/// Default number of resident frames per pool.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

/// Page cache over one file.
pub struct BufferPool {
    file: Mutex<File>,
    page_size: usize,
    capacity: usize,
    frames: RwLock<HashMap<PageId, Arc<RwLock<Page>>>>,
    /// FIFO of resident page ids, oldest first.
    order: Mutex<VecDeque<PageId>>,
    /// Number of pages in the file (resident or not).
    page_count: AtomicU64,
}

impl BufferPool {
    /// Open (or create) the backing file.
    pub fn open(path: &Path, page_size: usize, capacity: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        let pages = len / page_size as u64;
        Ok(BufferPool {
            file: Mutex::new(file),
            page_size,
            capacity: capacity.max(2),
            frames: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            page_count: AtomicU64::new(pages),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Pages in the file, including not-yet-flushed allocations.
    pub fn page_count(&self) -> u64 {
        self.page_count.load(Ordering::Acquire)
    }

    /// Append a zeroed page and return its id. The frame starts dirty so
    /// the next flush materialises it on disk.
    pub fn allocate(&self) -> StorageResult<PageId> {
        let pid = self.page_count.fetch_add(1, Ordering::AcqRel);
        let mut page = Page::new(self.page_size);
        // A no-op write sets the dirty flag
        page.put_i8(0, 0)?;
        self.install(pid, page)?;
        Ok(pid)
    }

    /// Run `f` with a shared borrow of the page.
    pub fn with_page<R>(
        &self,
        pid: PageId,
        f: impl FnOnce(&Page) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let frame = self.frame(pid)?;
        let guard = frame.read();
        f(&guard)
    }

    /// Run `f` with an exclusive borrow of the page.
    pub fn with_page_mut<R>(
        &self,
        pid: PageId,
        f: impl FnOnce(&mut Page) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let frame = self.frame(pid)?;
        let mut guard = frame.write();
        f(&mut guard)
    }

    /// Write every dirty resident page back to disk.
    pub fn flush(&self) -> StorageResult<()> {
        let frames = self.frames.read();
        for (pid, frame) in frames.iter() {
            let mut page = frame.write();
            if page.is_dirty() {
                self.write_back(*pid, &page)?;
                page.mark_clean();
            }
        }
        self.file.lock().sync_all()?;
        Ok(())
    }

    /// Resident frame for `pid`, faulting it in from disk on a miss.
    fn frame(&self, pid: PageId) -> StorageResult<Arc<RwLock<Page>>> {
        if pid >= self.page_count() {
            return Err(StorageError::PageNotFound(pid));
        }
        if let Some(frame) = self.frames.read().get(&pid) {
            return Ok(Arc::clone(frame));
        }
        let page = self.read_from_disk(pid)?;
        self.install(pid, page)
    }

    /// Insert a frame, keeping any frame another thread installed first
    /// (its writes must not be discarded).
    fn install(&self, pid: PageId, page: Page) -> StorageResult<Arc<RwLock<Page>>> {
        let mut frames = self.frames.write();
        let mut order = self.order.lock();
        if let Some(existing) = frames.get(&pid) {
            return Ok(Arc::clone(existing));
        }
        if frames.len() >= self.capacity {
            self.evict_one(&mut frames, &mut order)?;
        }
        let frame = Arc::new(RwLock::new(page));
        frames.insert(pid, Arc::clone(&frame));
        order.push_back(pid);
        Ok(frame)
    }

    /// Drop the oldest frame nobody is borrowing, writing it back first if
    /// dirty. Borrowed frames rotate to the back of the queue.
    fn evict_one(
        &self,
        frames: &mut HashMap<PageId, Arc<RwLock<Page>>>,
        order: &mut VecDeque<PageId>,
    ) -> StorageResult<()> {
        for _ in 0..order.len() {
            let Some(pid) = order.pop_front() else { break };
            let Some(frame) = frames.get(&pid) else {
                continue;
            };
            if Arc::strong_count(frame) > 1 {
                order.push_back(pid);
                continue;
            }
            {
                let mut page = frame.write();
                if page.is_dirty() {
                    self.write_back(pid, &page)?;
                    page.mark_clean();
                }
            }
            frames.remove(&pid);
            return Ok(());
        }
        // Every frame is borrowed; grow past capacity rather than block.
        Ok(())
    }

    fn read_from_disk(&self, pid: PageId) -> StorageResult<Page> {
        let mut file = self.file.lock();
        let offset = pid * self.page_size as u64;
        let mut buf = vec![0u8; self.page_size];
        if file.metadata()?.len() >= offset + self.page_size as u64 {
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        // Allocated but never flushed pages read back zeroed.
        Ok(Page::from_bytes(buf))
    }

    fn write_back(&self, pid: PageId, page: &Page) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pid * self.page_size as u64))?;
        file.write_all(page.as_bytes())?;
        Ok(())
    }
}
