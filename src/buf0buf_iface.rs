//! Collaborator traits this core drives but does not implement: the buffer
//! pool (page fetch/pin), the file-space allocator (extent/page alloc),
//! the lock manager, and the undo log. Only a minimal concrete
//! implementation of each is provided — enough to drive the in-scope tree,
//! record and compression code end to end in tests and the example binary.
//!
//! Grounded in `tablespace.rs`'s
//! existing mmap-backed page access (`TablespaceWriter::page_buf`), which
//! [`MmapBufferPool`] wraps rather than reimplements.

use std::collections::HashMap;

use crate::error::{DbErr, Result};
use crate::tablespace::MmapTablespaceWriter;

fn io_err<T>(r: std::io::Result<T>) -> Result<T> {
    r.map_err(DbErr::Io)
}

/// `buf_page_get_gen`/`buf_block_get_frame`, reduced to what the tree
/// cursor needs: per-page access under a closure (standing in for a latch
/// scope) and dirty-page bookkeeping. No eviction or real pinning — the
/// buffer pool itself is explicitly out of scope.
pub trait BufferPool {
    fn page_size(&self) -> usize;

    /// Run `f` with exclusive access to `page_no`'s bytes, as if latched
    /// for the duration of the call.
    fn with_page<R>(&mut self, page_no: u32, f: impl FnOnce(&mut [u8]) -> R) -> Result<R>;

    /// Number of pages currently backing this pool (including unallocated
    /// but mapped ones), used to bound `alloc_page`.
    fn page_count(&self) -> u32;

    /// Grow the pool by one zeroed page and return its number, for
    /// allocators backed by a pool that can extend itself (tests). A pool
    /// over a fixed-size file returns `Err(DbErr::OutOfFileSpace)` instead.
    fn grow(&mut self) -> Result<u32>;
}

/// In-memory `BufferPool`: a flat map of page number to an owned page
/// buffer, grown on demand. Used by unit tests that do not need a real
/// file behind them.
#[derive(Debug, Default)]
pub struct MemBufferPool {
    page_size: usize,
    pages: HashMap<u32, Vec<u8>>,
    next_page: u32,
}

impl MemBufferPool {
    pub fn new(page_size: usize) -> Self {
        MemBufferPool {
            page_size,
            pages: HashMap::new(),
            next_page: 0,
        }
    }

    /// Allocate a fresh, zeroed page and return its number.
    pub fn alloc_page(&mut self) -> u32 {
        let no = self.next_page;
        self.next_page += 1;
        self.pages.insert(no, vec![0u8; self.page_size]);
        no
    }

    pub fn free_page(&mut self, page_no: u32) {
        self.pages.remove(&page_no);
    }
}

impl BufferPool for MemBufferPool {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn with_page<R>(&mut self, page_no: u32, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let page = self.pages.get_mut(&page_no).ok_or(DbErr::Fail)?;
        Ok(f(page))
    }

    fn page_count(&self) -> u32 {
        self.next_page
    }

    fn grow(&mut self) -> Result<u32> {
        Ok(self.alloc_page())
    }
}

/// `BufferPool` over a memory-mapped tablespace file, wrapping
/// [`MmapTablespaceWriter`]; the example binary and integration tests that
/// want a real file on disk use this instead of [`MemBufferPool`].
pub struct MmapBufferPool {
    tablespace: MmapTablespaceWriter,
    page_count: u32,
}

impl MmapBufferPool {
    pub fn new(tablespace: MmapTablespaceWriter, page_count: u32) -> Self {
        MmapBufferPool {
            tablespace,
            page_count,
        }
    }
}

impl BufferPool for MmapBufferPool {
    fn page_size(&self) -> usize {
        self.tablespace.len() / self.page_count.max(1) as usize
    }

    fn with_page<R>(&mut self, page_no: u32, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut writer = io_err(
            self.tablespace
                .writer()
                .map_err(|e| std::io::Error::other(e.to_string())),
        )?;
        let page = io_err(writer.page_buf(page_no))?;
        Ok(f(page))
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn grow(&mut self) -> Result<u32> {
        Err(DbErr::OutOfFileSpace)
    }
}

/// `fsp_reserve_free_extents`/`btr_page_alloc`/`btr_page_free_low`, reduced
/// to first-fit bookkeeping over an in-memory free list. The file-space
/// allocator's real extent/segment structure is out of scope; this is only
/// enough to hand the tree cursor page numbers to build on.
pub trait FileSpaceAllocator {
    /// Verify `n` further page allocations can be satisfied without
    /// touching any of them; pessimistic entry points call this before any
    /// mutation, matching the "reserve extents up front" failure model.
    fn reserve_free_extents(&mut self, n: usize) -> Result<()>;

    fn alloc_page(&mut self, pool: &mut dyn BufferPool) -> Result<u32>;

    fn free_page(&mut self, page_no: u32);
}

/// First-fit allocator over a free-page list plus a high-water mark,
/// standing in for `fsp0fsp`'s real extent/segment bookkeeping.
#[derive(Debug, Default)]
pub struct SimpleExtentAllocator {
    free: Vec<u32>,
    high_water: u32,
}

impl SimpleExtentAllocator {
    pub fn new(high_water: u32) -> Self {
        SimpleExtentAllocator {
            free: Vec::new(),
            high_water,
        }
    }
}

impl FileSpaceAllocator for SimpleExtentAllocator {
    fn reserve_free_extents(&mut self, n: usize) -> Result<()> {
        // no real extent structure to exhaust in this minimal stand-in;
        // always succeeds, mirroring a tablespace with headroom.
        let _ = n;
        Ok(())
    }

    fn alloc_page(&mut self, pool: &mut dyn BufferPool) -> Result<u32> {
        if let Some(no) = self.free.pop() {
            return Ok(no);
        }
        let no = pool.grow()?;
        self.high_water = self.high_water.max(no + 1);
        Ok(no)
    }

    fn free_page(&mut self, page_no: u32) {
        self.free.push(page_no);
    }
}

/// `lock_rec_insert_check_and_lock`/`lock_clust_rec_modify_check_and_lock`
/// et al., reduced to the one signal the tree cursor's retry loops act on.
pub trait LockManager {
    fn check_and_lock(&mut self) -> Result<()>;
}

/// Never reports `LOCK_WAIT`; the default for single-threaded tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLockManager;

impl LockManager for NullLockManager {
    fn check_and_lock(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `trx_undo_report_row_operation`, reduced to a no-op sink since the
/// transaction/undo subsystem is out of scope.
pub trait UndoLog {
    fn report_row_operation(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullUndoLog;

impl UndoLog for NullUndoLog {
    fn report_row_operation(&mut self) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mem_pool_round_trips_a_write() {
        let mut pool = MemBufferPool::new(16384);
        let no = pool.alloc_page();
        pool.with_page(no, |p| p[0] = 0x42).unwrap();
        let v = pool.with_page(no, |p| p[0]).unwrap();
        assert_eq!(v, 0x42);
    }

    #[test]
    fn allocator_reuses_freed_pages_first() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let a = alloc.alloc_page(&mut pool).unwrap();
        let b = alloc.alloc_page(&mut pool).unwrap();
        alloc.free_page(a);
        let c = alloc.alloc_page(&mut pool).unwrap();
        assert_eq!(c, a);
        assert_ne!(a, b);
    }
}
