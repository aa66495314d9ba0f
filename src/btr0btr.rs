//! Tree-structural operations: the root page, node-pointer records, level
//! linkage and page allocation that [`crate::btr0cur`] builds descent and
//! split/merge on top of.
//!
//! Grounded in `btr_btr.hpp`: `btr_root_get`, `btr_page_get_level`,
//! `btr_page_get_next`/`_prev`, `btr_node_ptr_get_child_page_no`,
//! `btr_create`, `btr_get_size`. Segment/extent bookkeeping
//! (`btr_create`'s `FSEG_HEADER`s) is out of scope here — page allocation
//! goes through [`crate::buf0buf_iface::FileSpaceAllocator`] instead, as a
//! collaborator boundary.

use crate::buf0buf_iface::{BufferPool, FileSpaceAllocator};
use crate::btr0types::BtrSizeKind;
use crate::data0data::{DField, DTuple};
use crate::error::Result;
use crate::fil0fil;
use crate::mach;
use crate::page0cur;
use crate::page0types::{self, PageCurMode};
use crate::rem0rec::{self, RecOffsets};
use crate::rem0types::{FieldDef, IndexDesc};

/// A clustered or secondary index's tree-wide identity: its column shape,
/// the tablespace it lives in, and the root page. `modify_clock` stands in
/// for the original's per-block `buf_block_t::modify_clock`: the original
/// bumps a counter on every block each time it is structurally touched so
/// a persistent cursor ([`crate::btr0pcur`]) can tell a stale position from
/// a fresh one; this port has no per-block object, only a page number, so
/// the clock is kept once per tree instead of once per block. A restore
/// after *any* tree-wide mutation since the position was stored is treated
/// as potentially stale, which is conservative (more re-searches than the
/// original) but never wrong.
#[derive(Debug, Clone)]
pub struct BtrIndex {
    pub index: IndexDesc,
    pub index_id: u64,
    pub space_id: u32,
    pub root_page_no: u32,
    pub page_size: usize,
    /// Whether this is the table's clustered index; only a clustered
    /// index's records may carry big-rec external references.
    pub is_clustered: bool,
    pub modify_clock: u64,
}

impl BtrIndex {
    pub fn bump_modify_clock(&mut self) {
        self.modify_clock = self.modify_clock.wrapping_add(1);
    }
}

/// Build the `IndexDesc` node-pointer records on non-leaf pages are laid
/// out against: the leaf index's first `n_unique` (key) fields, plus one
/// appended fixed 4-byte field carrying the child page number
/// (`btr_page_get_level`'s "node pointer" shape). Reusing
/// [`crate::rem0rec`]/[`crate::page0cur`] against this derived `IndexDesc`
/// means non-leaf pages need no parallel record representation.
pub fn node_ptr_index(index: &IndexDesc) -> IndexDesc {
    let mut fields: Vec<FieldDef> = index.fields[..index.n_unique].to_vec();
    fields.push(FieldDef::fixed(4, false));
    IndexDesc::new(index.is_comp, fields, index.n_unique)
}

/// Build the tuple for a node-pointer record: `key`'s fields (already
/// truncated to `n_unique`) plus the child page number as the trailing
/// fixed field, matching [`node_ptr_index`]'s shape.
pub fn make_node_ptr(index: &IndexDesc, key: Vec<DField>, child_page_no: u32) -> DTuple {
    debug_assert_eq!(key.len(), index.n_unique);
    let mut fields = key;
    fields.push(DField::new(
        crate::data0data::DType::new(crate::data0data::DATA_SYS, 0, 4),
        child_page_no.to_be_bytes().to_vec(),
    ));
    let mut t = DTuple::new(fields);
    t.set_n_fields_cmp(index.n_unique);
    t
}

/// Read the child page number out of the trailing field of a node-pointer
/// record at `rec_offset`, against `node_index` (as built by
/// [`node_ptr_index`]).
pub fn node_ptr_get_child_page_no(
    page: &[u8],
    rec_offset: usize,
    node_index: &IndexDesc,
) -> Result<u32> {
    let offsets = RecOffsets::compute(page, rec_offset, node_index)?;
    let last = node_index.n_fields() - 1;
    let data = offsets.field_data(page, rec_offset, last);
    Ok(mach::mach_read_from_4(data))
}

/// `btr_page_get_level`: the B-tree level this page sits at (0 = leaf).
pub fn page_get_level(page: &[u8]) -> u16 {
    mach::mach_read_from_2(&page[page0types::PAGE_LEVEL..])
}

pub fn page_set_level(page: &mut [u8], level: u16) {
    mach::mach_write_to_2(&mut page[page0types::PAGE_LEVEL..], level).unwrap();
}

/// `btr_page_get_index_id`.
pub fn page_get_index_id(page: &[u8]) -> u64 {
    mach::mach_read_from_8(&page[page0types::PAGE_INDEX_ID..])
}

/// `btr_page_get_next`/`btr_page_get_prev`: sibling page numbers at this
/// page's level, or [`fil0fil::FIL_NULL`] at either end.
pub fn page_get_next(page: &[u8]) -> u32 {
    mach::mach_read_from_4(&page[fil0fil::FIL_PAGE_NEXT as usize..])
}

pub fn page_get_prev(page: &[u8]) -> u32 {
    mach::mach_read_from_4(&page[fil0fil::FIL_PAGE_PREV as usize..])
}

fn page_set_next(page: &mut [u8], page_no: u32) {
    mach::mach_write_to_4(&mut page[fil0fil::FIL_PAGE_NEXT as usize..], page_no).unwrap();
}

fn page_set_prev(page: &mut [u8], page_no: u32) {
    mach::mach_write_to_4(&mut page[fil0fil::FIL_PAGE_PREV as usize..], page_no).unwrap();
}

/// Set `page_no`'s `FIL_PAGE_NEXT` field, through the buffer pool.
pub fn set_next<B: BufferPool>(pool: &mut B, page_no: u32, next: u32) -> Result<()> {
    if page_no == fil0fil::FIL_NULL {
        return Ok(());
    }
    pool.with_page(page_no, |page| page_set_next(page, next))
}

pub fn set_prev<B: BufferPool>(pool: &mut B, page_no: u32, prev: u32) -> Result<()> {
    if page_no == fil0fil::FIL_NULL {
        return Ok(());
    }
    pool.with_page(page_no, |page| page_set_prev(page, prev))
}

/// Initialize the FIL header fields [`crate::page0cur::create_page`]
/// itself does not touch (it only zeroes the page-header region onward):
/// `FIL_PAGE_OFFSET`, `FIL_PAGE_SPACE_ID`, `FIL_PAGE_TYPE`, and both
/// sibling pointers reset to `FIL_NULL`.
fn init_fil_header(page: &mut [u8], space_id: u32, page_no: u32) {
    mach::mach_write_to_4(&mut page[fil0fil::FIL_PAGE_OFFSET as usize..], page_no).unwrap();
    mach::mach_write_to_4(
        &mut page[fil0fil::FIL_PAGE_SPACE_ID as usize..],
        space_id,
    )
    .unwrap();
    mach::mach_write_to_2(
        &mut page[fil0fil::FIL_PAGE_TYPE as usize..],
        fil0fil::FIL_PAGE_INDEX,
    )
    .unwrap();
    page_set_prev(page, fil0fil::FIL_NULL);
    page_set_next(page, fil0fil::FIL_NULL);
}

/// `btr_page_alloc`: take a fresh page from the allocator and lay out an
/// empty index page of `level` on it, tagged with `index_id`.
pub fn create<B: BufferPool, A: FileSpaceAllocator>(
    pool: &mut B,
    alloc: &mut A,
    space_id: u32,
    index_id: u64,
    is_comp: bool,
    level: u16,
) -> Result<u32> {
    let page_no = alloc.alloc_page(pool)?;
    let page_size = pool.page_size();
    pool.with_page(page_no, |page| {
        init_fil_header(page, space_id, page_no);
        page0cur::create_page(page, page_size, is_comp, level, index_id);
    })?;
    Ok(page_no)
}

/// `btr_page_free_low`: return `page_no` to the allocator. The caller is
/// responsible for having already unlinked it from its level.
pub fn free_page<B: BufferPool, A: FileSpaceAllocator>(
    _pool: &mut B,
    alloc: &mut A,
    page_no: u32,
) {
    alloc.free_page(page_no);
}

/// `btr_create`: allocate a tree's first (root, leaf) page and return the
/// fully-formed [`BtrIndex`] describing it.
pub fn create_tree<B: BufferPool, A: FileSpaceAllocator>(
    pool: &mut B,
    alloc: &mut A,
    space_id: u32,
    index_id: u64,
    index: IndexDesc,
    is_clustered: bool,
) -> Result<BtrIndex> {
    let is_comp = index.is_comp;
    let page_size = pool.page_size();
    let root_page_no = create(pool, alloc, space_id, index_id, is_comp, 0)?;
    Ok(BtrIndex {
        index,
        index_id,
        space_id,
        root_page_no,
        page_size,
        is_clustered,
        modify_clock: 0,
    })
}

/// Walk from `page_no` down the leftmost child chain to level 0, reading
/// the first user record of each non-leaf page as a node pointer. Used by
/// [`get_size`] and by callers that want "the leftmost leaf" without a
/// search key (`btr_get_size`'s traversal, following the leftmost-page
/// convention).
pub fn leftmost_leaf<B: BufferPool>(pool: &mut B, index: &BtrIndex) -> Result<u32> {
    let node_index = node_ptr_index(&index.index);
    let mut page_no = index.root_page_no;
    loop {
        let (level, first_user) = pool.with_page(page_no, |page| {
            let level = page_get_level(page);
            let is_comp = index.index.is_comp;
            let inf = page0types::page_infimum_offset(is_comp);
            let first = page0cur::rec_get_next_offset(page, inf, is_comp);
            (level, first)
        })?;
        if level == 0 {
            return Ok(page_no);
        }
        let child = pool.with_page(page_no, |page| {
            node_ptr_get_child_page_no(page, first_user, &node_index)
        })??;
        page_no = child;
    }
}

/// `btr_get_size`: report either the leaf page count or an approximate
/// total byte footprint (sum of each leaf's used-byte count, i.e.
/// `PAGE_HEAP_TOP` minus its header) by walking the leaf level once.
pub fn get_size<B: BufferPool>(pool: &mut B, index: &BtrIndex, kind: BtrSizeKind) -> Result<u64> {
    let mut page_no = leftmost_leaf(pool, index)?;
    let mut total = 0u64;
    loop {
        let (used, next) = pool.with_page(page_no, |page| {
            let heap_top =
                page0types::page_header_get_field(page, page0types::PAGE_HEAP_TOP) as u64;
            (heap_top, page_get_next(page))
        })?;
        total += match kind {
            BtrSizeKind::NLeafPages => 1,
            BtrSizeKind::TotalSize => used,
        };
        if next == fil0fil::FIL_NULL {
            break;
        }
        page_no = next;
    }
    Ok(total)
}

/// Linear scan of a page's user records (infimum-exclusive,
/// supremum-exclusive), decoded against `index`, in chain order. Shared by
/// [`crate::btr0cur`]'s root-raise and page-split paths, which both need to
/// rebuild a page's full record set as owned tuples before reinserting a
/// subset of them elsewhere.
pub fn collect_user_tuples(page: &[u8], index: &IndexDesc) -> Vec<DTuple> {
    let is_comp = index.is_comp;
    let mut out = Vec::new();
    let mut cur = page0types::page_infimum_offset(is_comp);
    let supremum = page0types::page_supremum_offset(is_comp);
    loop {
        cur = page0cur::rec_get_next_offset(page, cur, is_comp);
        if cur == supremum {
            break;
        }
        let Ok(offsets) = RecOffsets::compute(page, cur, index) else {
            break;
        };
        let hdr = rem0rec::read_header(page, cur, is_comp);
        let mut t = rem0rec::copy_prefix_to_dtuple(page, cur, &offsets, index, index.n_fields());
        t.info_bits = hdr.info_bits;
        out.push(t);
    }
    out
}

/// Insert every tuple of `tuples` into `page_no`, in order, via
/// [`page0cur::search`]/[`page0cur::tuple_insert`] against `index`. Used to
/// repopulate a page from a [`collect_user_tuples`] snapshot; assumes the
/// page already has room (callers only use this right after
/// [`page0cur::create_page`] on a page sized to hold them).
pub fn reinsert_all<B: BufferPool>(
    pool: &mut B,
    page_no: u32,
    page_size: usize,
    index: &IndexDesc,
    tuples: &[DTuple],
) -> Result<()> {
    for t in tuples {
        pool.with_page(page_no, |page| -> Result<()> {
            let res = page0cur::search(page, page_size, index, t, PageCurMode::LessOrEqual)?;
            page0cur::tuple_insert(page, page_size, res.cursor, t, index)?;
            Ok(())
        })??;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buf0buf_iface::{MemBufferPool, SimpleExtentAllocator};
    use crate::data0data::{DATA_INT, DATA_NOT_NULL, DType};

    fn index() -> IndexDesc {
        IndexDesc::new(true, vec![FieldDef::fixed(4, false)], 1)
    }

    #[test]
    fn create_tree_starts_with_an_empty_leaf_root() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let btr = create_tree(&mut pool, &mut alloc, 0, 55, index(), true).unwrap();
        let level = pool.with_page(btr.root_page_no, |p| page_get_level(p)).unwrap();
        assert_eq!(level, 0);
        assert_eq!(
            pool.with_page(btr.root_page_no, |p| page_get_index_id(p))
                .unwrap(),
            55
        );
    }

    #[test]
    fn node_ptr_round_trips_child_page_no() {
        let idx = index();
        let node_idx = node_ptr_index(&idx);
        let id_type = DType::new(DATA_INT, DATA_NOT_NULL, 4);
        let key = vec![DField::new(id_type, 7i32.to_be_bytes().to_vec())];
        let tuple = make_node_ptr(&idx, key, 42);

        let mut page = vec![0u8; 16384];
        page0cur::create_page(&mut page, 16384, true, 1, 9);
        let res =
            page0cur::search(&page, 16384, &node_idx, &tuple, PageCurMode::LessOrEqual).unwrap();
        let off = page0cur::tuple_insert(&mut page, 16384, res.cursor, &tuple, &node_idx)
            .unwrap()
            .unwrap();
        assert_eq!(
            node_ptr_get_child_page_no(&page, off, &node_idx).unwrap(),
            42
        );
    }

    #[test]
    fn get_size_counts_a_single_leaf_page() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let btr = create_tree(&mut pool, &mut alloc, 0, 1, index(), true).unwrap();
        assert_eq!(
            get_size(&mut pool, &btr, BtrSizeKind::NLeafPages).unwrap(),
            1
        );
    }
}
