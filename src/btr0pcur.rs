//! The persistent cursor: a tree-cursor position that survives across MTR
//! boundaries by storing a key prefix and re-searching on restore.
//!
//! Grounded in `btr_pcur_t`. No `original_source/` header for
//! `btr_pcur` was in the retrieved pack, so the restore algorithm below
//! is built directly from its description: store a prefix of
//! the current record (or a before-first/after-last sentinel) plus the
//! tree's modify clock, then on restore prefer re-landing on the exact
//! stored offset and fall back to a fresh descent with the stored prefix.

use std::cmp::Ordering;

use crate::btr0btr::{self, BtrIndex};
use crate::btr0cur::{self, BtrCursor};
use crate::btr0types::BtrLatchMode;
use crate::buf0buf_iface::BufferPool;
use crate::data0data::DTuple;
use crate::error::Result;
use crate::fil0fil;
use crate::page0cur;
use crate::page0types::{self, PageCurMode};
use crate::rem0rec::{self, RecOffsets};

/// Which side of the search target the cursor rested on when the position
/// was taken, so [`BtrPcur::restore_position`] knows which direction to
/// re-search in on the slow path. `On` means the cursor sits on a real
/// record; `Before`/`After` are the empty-tree (or end-of-level)
/// sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelPos {
    Before,
    On,
    After,
}

/// Outcome of [`BtrPcur::restore_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The block was untouched (tree `modify_clock` unchanged) and the
    /// stored offset still holds the same record: cheapest case, no
    /// re-search performed.
    Exact,
    /// A re-search landed on a record whose stored key prefix compares
    /// byte-equal to what was saved: same logical row, possibly moved.
    SameRecord,
    /// A re-search landed near, but not on, the saved key: the caller must
    /// re-check visibility/ordering before trusting the new position.
    NearPosition,
}

/// `btr_pcur_t`: a [`BtrCursor`]'s resting position plus what is needed to
/// find it again after the page it was taken on may have been split,
/// merged, or reorganized.
#[derive(Debug, Clone)]
pub struct BtrPcur {
    pub page_no: u32,
    pub rec_offset: usize,
    pub up_match: usize,
    pub low_match: usize,
    stored: Option<DTuple>,
    rel_pos: RelPos,
    modify_clock: u64,
}

impl BtrPcur {
    /// Wrap a freshly produced [`BtrCursor`], inferring the initial
    /// [`RelPos`] from the search mode that produced it (`GE`/`G` land at
    /// or after the target, `LE`/`L`/`Dbg` at or before it).
    pub fn from_cursor(cursor: &BtrCursor, mode: PageCurMode) -> Self {
        let rel_pos = match mode {
            PageCurMode::GreaterOrEqual | PageCurMode::Greater => RelPos::After,
            _ => RelPos::Before,
        };
        BtrPcur {
            page_no: cursor.page_no,
            rec_offset: cursor.page_cur.rec_offset,
            up_match: cursor.up_match,
            low_match: cursor.low_match,
            stored: None,
            rel_pos,
            modify_clock: 0,
        }
    }

    /// `btr_pcur_open`: search the tree and wrap the resulting cursor.
    pub fn open<B: BufferPool>(
        pool: &mut B,
        index: &BtrIndex,
        tuple: &DTuple,
        mode: PageCurMode,
        latch_mode: BtrLatchMode,
    ) -> Result<Self> {
        let cursor = btr0cur::search_to_nth_level(pool, index, 0, tuple, mode, latch_mode)?;
        Ok(Self::from_cursor(&cursor, mode))
    }

    pub fn is_before_first(&self, index: &BtrIndex) -> bool {
        self.rec_offset == page0types::page_infimum_offset(index.index.is_comp)
    }

    pub fn is_after_last(&self, index: &BtrIndex) -> bool {
        self.rec_offset == page0types::page_supremum_offset(index.index.is_comp)
    }

    /// `btr_pcur_store_position`: save a prefix of the current record (its
    /// first `n_unique` fields — enough to relocate it uniquely) and the
    /// tree's current `modify_clock`, or a before-first/after-last
    /// sentinel if the cursor currently rests on neither a real record.
    pub fn store_position<B: BufferPool>(&mut self, pool: &mut B, index: &BtrIndex) -> Result<()> {
        let is_comp = index.index.is_comp;
        if self.rec_offset == page0types::page_infimum_offset(is_comp) {
            self.stored = None;
            self.rel_pos = RelPos::Before;
        } else if self.rec_offset == page0types::page_supremum_offset(is_comp) {
            self.stored = None;
            self.rel_pos = RelPos::After;
        } else {
            let rec_offset = self.rec_offset;
            let n_unique = index.index.n_unique;
            let tuple = pool.with_page(self.page_no, |page| {
                let offsets = RecOffsets::compute(page, rec_offset, &index.index)?;
                Ok::<DTuple, crate::error::DbErr>(rem0rec::copy_prefix_to_dtuple(
                    page, rec_offset, &offsets, &index.index, n_unique,
                ))
            })??;
            self.stored = Some(tuple);
            self.rel_pos = RelPos::On;
        }
        self.modify_clock = index.modify_clock;
        Ok(())
    }

    fn prefix_still_matches<B: BufferPool>(
        &self,
        pool: &mut B,
        index: &BtrIndex,
        page_no: u32,
        rec_offset: usize,
        prefix: &DTuple,
    ) -> Result<bool> {
        pool.with_page(page_no, |page| {
            let Ok(offsets) = RecOffsets::compute(page, rec_offset, &index.index) else {
                return false;
            };
            let (mf, _, ord) =
                page0cur::cmp_dtuple_rec(prefix, page, rec_offset, &offsets, &index.index);
            ord == Ordering::Equal && mf >= prefix.n_fields_cmp
        })
    }

    /// `btr_pcur_restore_position`: re-latch the block at the saved offset
    /// if the tree is provably untouched since [`Self::store_position`];
    /// otherwise redo a tree search with the stored key prefix and report
    /// how close the result is to the saved position.
    pub fn restore_position<B: BufferPool>(
        &mut self,
        pool: &mut B,
        index: &BtrIndex,
        latch_mode: BtrLatchMode,
    ) -> Result<RestoreOutcome> {
        if index.modify_clock == self.modify_clock {
            match &self.stored {
                Some(prefix) => {
                    if self.prefix_still_matches(pool, index, self.page_no, self.rec_offset, prefix)? {
                        return Ok(RestoreOutcome::Exact);
                    }
                }
                None => return Ok(RestoreOutcome::Exact),
            }
        }

        let Some(prefix) = self.stored.clone() else {
            let (page_no, rec_offset) = sentinel_cursor(pool, index, self.rel_pos)?;
            self.page_no = page_no;
            self.rec_offset = rec_offset;
            self.modify_clock = index.modify_clock;
            return Ok(RestoreOutcome::Exact);
        };

        let mode = match self.rel_pos {
            RelPos::Before => PageCurMode::LessOrEqual,
            RelPos::After => PageCurMode::GreaterOrEqual,
            RelPos::On => PageCurMode::LessOrEqual,
        };
        let cursor = btr0cur::search_to_nth_level(pool, index, 0, &prefix, mode, latch_mode)?;
        let same = self.prefix_still_matches(
            pool,
            index,
            cursor.page_no,
            cursor.page_cur.rec_offset,
            &prefix,
        )?;

        self.page_no = cursor.page_no;
        self.rec_offset = cursor.page_cur.rec_offset;
        self.up_match = cursor.up_match;
        self.low_match = cursor.low_match;
        self.modify_clock = index.modify_clock;

        if same {
            Ok(RestoreOutcome::SameRecord)
        } else {
            Ok(RestoreOutcome::NearPosition)
        }
    }

    /// `btr_pcur_move_to_next`: advance within the current page, crossing
    /// to the next leaf page via [`Self::move_to_next_page`] at its
    /// supremum. Returns `false` once it has run off the rightmost leaf.
    pub fn move_to_next<B: BufferPool>(&mut self, pool: &mut B, index: &BtrIndex) -> Result<bool> {
        let is_comp = index.index.is_comp;
        let supremum = page0types::page_supremum_offset(is_comp);
        if self.rec_offset == supremum {
            return self.move_to_next_page(pool, index);
        }
        let (page_no, rec_offset) = (self.page_no, self.rec_offset);
        let next =
            pool.with_page(page_no, |page| page0cur::rec_get_next_offset(page, rec_offset, is_comp))?;
        self.rec_offset = next;
        if next == supremum {
            return self.move_to_next_page(pool, index);
        }
        Ok(true)
    }

    /// `btr_pcur_move_to_prev`: step backward within the current page,
    /// crossing to the previous leaf page via
    /// [`Self::move_backward_from_page`] at its infimum.
    pub fn move_to_prev<B: BufferPool>(&mut self, pool: &mut B, index: &BtrIndex) -> Result<bool> {
        let is_comp = index.index.is_comp;
        let infimum = page0types::page_infimum_offset(is_comp);
        if self.rec_offset == infimum {
            return self.move_backward_from_page(pool, index);
        }
        let (page_no, rec_offset) = (self.page_no, self.rec_offset);
        let prev = pool.with_page(page_no, |page| {
            find_prev_in_chain(page, is_comp, rec_offset)
        })?;
        self.rec_offset = prev;
        if prev == infimum {
            return self.move_backward_from_page(pool, index);
        }
        Ok(true)
    }

    /// Release the current leaf and land on the first user record of the
    /// next one, following `btr_pcur_t`'s level-crossing behavior. Stores position
    /// first (the tree may be touched while this page's latch is not
    /// held), matching the original's "re-store to avoid deadlock" note.
    pub fn move_to_next_page<B: BufferPool>(
        &mut self,
        pool: &mut B,
        index: &BtrIndex,
    ) -> Result<bool> {
        self.store_position(pool, index)?;
        let next_page = pool.with_page(self.page_no, |page| btr0btr::page_get_next(page))?;
        let is_comp = index.index.is_comp;
        if next_page == fil0fil::FIL_NULL {
            self.rec_offset = page0types::page_supremum_offset(is_comp);
            return Ok(false);
        }
        self.page_no = next_page;
        let infimum = page0types::page_infimum_offset(is_comp);
        let first = pool.with_page(next_page, |page| {
            page0cur::rec_get_next_offset(page, infimum, is_comp)
        })?;
        self.rec_offset = first;
        self.rel_pos = RelPos::Before;
        Ok(first != page0types::page_supremum_offset(is_comp))
    }

    /// Release the current leaf and land on the last user record of the
    /// previous one.
    pub fn move_backward_from_page<B: BufferPool>(
        &mut self,
        pool: &mut B,
        index: &BtrIndex,
    ) -> Result<bool> {
        self.store_position(pool, index)?;
        let prev_page = pool.with_page(self.page_no, |page| btr0btr::page_get_prev(page))?;
        let is_comp = index.index.is_comp;
        if prev_page == fil0fil::FIL_NULL {
            self.rec_offset = page0types::page_infimum_offset(is_comp);
            return Ok(false);
        }
        self.page_no = prev_page;
        let supremum = page0types::page_supremum_offset(is_comp);
        let last = pool.with_page(prev_page, |page| find_prev_in_chain(page, is_comp, supremum))?;
        self.rec_offset = last;
        self.rel_pos = RelPos::After;
        Ok(last != page0types::page_infimum_offset(is_comp))
    }
}

fn find_prev_in_chain(page: &[u8], is_comp: bool, rec_offset: usize) -> usize {
    let mut cur = page0types::page_infimum_offset(is_comp);
    loop {
        let next = page0cur::rec_get_next_offset(page, cur, is_comp);
        if next == rec_offset {
            return cur;
        }
        cur = next;
    }
}

/// Land on the leftmost page's infimum (`Before`) or the rightmost page's
/// supremum (`After`/`On` with nothing stored), for restoring a pcur that
/// was saved over an empty result or an end-of-level sentinel.
fn sentinel_cursor<B: BufferPool>(
    pool: &mut B,
    index: &BtrIndex,
    rel_pos: RelPos,
) -> Result<(u32, usize)> {
    let is_comp = index.index.is_comp;
    let mut page_no = btr0btr::leftmost_leaf(pool, index)?;
    if rel_pos == RelPos::Before {
        return Ok((page_no, page0types::page_infimum_offset(is_comp)));
    }
    loop {
        let next = pool.with_page(page_no, |page| btr0btr::page_get_next(page))?;
        if next == fil0fil::FIL_NULL {
            break;
        }
        page_no = next;
    }
    Ok((page_no, page0types::page_supremum_offset(is_comp)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::btr0btr::create_tree;
    use crate::btr0cur::optimistic_insert;
    use crate::buf0buf_iface::{MemBufferPool, SimpleExtentAllocator};
    use crate::data0data::{DATA_INT, DATA_NOT_NULL, DATA_VARCHAR, DField, DType};
    use crate::rem0types::{FieldDef, IndexDesc};

    fn index_desc() -> IndexDesc {
        IndexDesc::new(
            true,
            vec![FieldDef::fixed(4, false), FieldDef::variable(200, false, false)],
            1,
        )
    }

    fn tuple(id: i32, s: &str) -> DTuple {
        let id_type = DType::new(DATA_INT, DATA_NOT_NULL, 4);
        let s_type = DType::new(DATA_VARCHAR, DATA_NOT_NULL, 200);
        DTuple::new(vec![
            DField::new(id_type, id.to_be_bytes().to_vec()),
            DField::new(s_type, s.as_bytes().to_vec()),
        ])
    }

    fn insert_all(pool: &mut MemBufferPool, btr: &mut BtrIndex, rows: &[(i32, &str)]) {
        for (id, s) in rows {
            let t = tuple(*id, s);
            let cur = btr0cur::search_to_nth_level(
                pool,
                btr,
                0,
                &t,
                PageCurMode::LessOrEqual,
                BtrLatchMode::ModifyLeaf,
            )
            .unwrap();
            optimistic_insert(pool, btr, &cur, &t).unwrap();
        }
    }

    #[test]
    fn exact_restore_when_tree_untouched() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let mut btr = create_tree(&mut pool, &mut alloc, 0, 1, index_desc(), true).unwrap();
        insert_all(&mut pool, &mut btr, &[(1, "a"), (2, "b"), (3, "c")]);

        let t = tuple(2, "");
        let mut pcur = BtrPcur::open(
            &mut pool,
            &btr,
            &t,
            PageCurMode::GreaterOrEqual,
            BtrLatchMode::SearchLeaf,
        )
        .unwrap();
        pcur.store_position(&mut pool, &btr).unwrap();

        let outcome = pcur
            .restore_position(&mut pool, &btr, BtrLatchMode::SearchLeaf)
            .unwrap();
        assert_eq!(outcome, RestoreOutcome::Exact);
    }

    #[test]
    fn same_record_restore_after_tree_mutation() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let mut btr = create_tree(&mut pool, &mut alloc, 0, 2, index_desc(), true).unwrap();
        insert_all(&mut pool, &mut btr, &[(1, "a"), (3, "c")]);

        let t = tuple(3, "");
        let mut pcur = BtrPcur::open(
            &mut pool,
            &btr,
            &t,
            PageCurMode::GreaterOrEqual,
            BtrLatchMode::SearchLeaf,
        )
        .unwrap();
        pcur.store_position(&mut pool, &btr).unwrap();

        // a further insert bumps the tree's modify clock, forcing the
        // slow re-search path even though record 3 did not move.
        insert_all(&mut pool, &mut btr, &[(2, "b")]);

        let outcome = pcur
            .restore_position(&mut pool, &btr, BtrLatchMode::SearchLeaf)
            .unwrap();
        assert_eq!(outcome, RestoreOutcome::SameRecord);
    }

    #[test]
    fn move_to_next_walks_in_key_order() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let mut btr = create_tree(&mut pool, &mut alloc, 0, 3, index_desc(), true).unwrap();
        insert_all(&mut pool, &mut btr, &[(1, "a"), (2, "b"), (3, "c")]);

        let t = tuple(1, "");
        let cursor = btr0cur::search_to_nth_level(
            &mut pool,
            &btr,
            0,
            &t,
            PageCurMode::GreaterOrEqual,
            BtrLatchMode::SearchLeaf,
        )
        .unwrap();
        let mut pcur = BtrPcur::from_cursor(&cursor, PageCurMode::GreaterOrEqual);

        let mut seen = Vec::new();
        loop {
            let page = pool_page(&mut pool, pcur.page_no);
            let offsets = RecOffsets::compute(&page, pcur.rec_offset, &btr.index).unwrap();
            seen.push(offsets.field_data(&page, pcur.rec_offset, 0).to_vec());
            if !pcur.move_to_next(&mut pool, &btr).unwrap() {
                break;
            }
        }
        assert_eq!(seen, vec![1i32.to_be_bytes().to_vec(), 2i32.to_be_bytes().to_vec(), 3i32.to_be_bytes().to_vec()]);
    }

    fn pool_page(pool: &mut MemBufferPool, page_no: u32) -> Vec<u8> {
        pool.with_page(page_no, |p| p.to_vec()).unwrap()
    }

    #[test]
    fn before_first_sentinel_round_trips() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let mut btr = create_tree(&mut pool, &mut alloc, 0, 4, index_desc(), true).unwrap();
        insert_all(&mut pool, &mut btr, &[(1, "a")]);

        let t = tuple(0, "");
        let mut pcur = BtrPcur::open(
            &mut pool,
            &btr,
            &t,
            PageCurMode::LessOrEqual,
            BtrLatchMode::SearchLeaf,
        )
        .unwrap();
        assert!(pcur.is_before_first(&btr));
        pcur.store_position(&mut pool, &btr).unwrap();

        let outcome = pcur
            .restore_position(&mut pool, &btr, BtrLatchMode::SearchLeaf)
            .unwrap();
        assert_eq!(outcome, RestoreOutcome::Exact);
        assert!(pcur.is_before_first(&btr));
    }
}
