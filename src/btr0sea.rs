//! The adaptive hash index: a process-wide fold -> record pointer cache
//! over leaf pages, opportunistically built and probed by the tree cursor.
//!
//! Grounded in `btr_sea.hpp`. Its global table is a
//! `mem_heap_t`-backed open-addressing hash table guarded by a single
//! `rw_lock_t`; this port keeps the same single-latch shape but uses
//! `std::collections::HashMap` behind a `std::sync::RwLock`, matching the
//! in-process concurrency primitives `shoyo-jindb`'s `buffer/manager.rs`
//! already uses elsewhere in this pack for a shared page/latch table (this
//! crate's own teacher has no concurrency primitives of its own to
//! generalize from).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::btr0types::{BTR_SEARCH_HASH_ANALYSIS, BTR_SEARCH_ON_HASH_LIMIT, BTR_SEA_TIMEOUT};
use crate::buf0buf_iface::BufferPool;
use crate::data0data::DTuple;
use crate::error::{DbErr, Result};
use crate::page0cur;
use crate::page0types::{self, PageCurMode};
use crate::rem0rec::{self, RecOffsets};
use crate::rem0types::IndexDesc;

/// `{block_id, in_page_offset}` relation the hash stores in place of a raw
/// `rec_t*`: never an owning pointer, always
/// re-validated against the live page under its latch before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashNode {
    pub page_no: u32,
    pub rec_offset: usize,
}

/// `btr_search_t`: the recommended hash prefix for one index plus the
/// recent-search counters [`AdaptiveHashIndex::search_info_update`] drives.
#[derive(Debug, Clone, Copy)]
pub struct SearchInfo {
    /// Number of leading fields the hash is built/probed over.
    pub n_fields: usize,
    /// Additional bytes of the first non-participating field, for
    /// prefixes that end mid-field.
    pub n_bytes: usize,
    /// Whether searches on this index tend to approach a key from the
    /// left (`PAGE_CUR_GE`-style) or the right (`PAGE_CUR_LE`-style);
    /// mirrors `btr_search_t::left_side`.
    pub left_side: bool,
    hash_analysis: u32,
    n_hash_potential: u32,
    last_hash_succeeded: bool,
}

impl Default for SearchInfo {
    fn default() -> Self {
        SearchInfo {
            n_fields: 1,
            n_bytes: 0,
            left_side: true,
            hash_analysis: 0,
            n_hash_potential: 0,
            last_hash_succeeded: false,
        }
    }
}

struct Inner {
    enabled: bool,
    table: HashMap<u64, Vec<HashNode>>,
    search_info: HashMap<u64, SearchInfo>,
    index_refs: HashMap<u64, u32>,
    timeouts: u32,
}

/// The process-wide adaptive hash index state object: explicit state
/// rather than global mutable state, with `init()`/`close()` lifecycle.
/// `index_refs` tracks how many live `BtrIndex`es currently reference the
/// table; [`AdaptiveHashIndex::close`] refuses while any remain, matching
/// the "must reach zero before close" requirement.
pub struct AdaptiveHashIndex {
    inner: RwLock<Inner>,
}

fn hash_key(index_id: u64, fold: u32) -> u64 {
    (fold as u64) ^ index_id.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

impl AdaptiveHashIndex {
    /// `btr_search_sys_create`.
    pub fn new() -> Self {
        AdaptiveHashIndex {
            inner: RwLock::new(Inner {
                enabled: true,
                table: HashMap::new(),
                search_info: HashMap::new(),
                index_refs: HashMap::new(),
                timeouts: 0,
            }),
        }
    }

    /// `btr_search_enable`.
    pub fn enable(&self) {
        self.inner.write().unwrap().enabled = true;
    }

    /// `btr_search_disable`: drains the table and blocks future builds
    /// until [`Self::enable`] is called again.
    pub fn disable(&self) {
        let mut g = self.inner.write().unwrap();
        g.enabled = false;
        g.table.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.read().unwrap().enabled
    }

    /// Register a tree as a live user of this table; call once when a
    /// `BtrIndex` is created/opened.
    pub fn register_index(&self, index_id: u64) {
        let mut g = self.inner.write().unwrap();
        *g.index_refs.entry(index_id).or_insert(0) += 1;
        g.search_info.entry(index_id).or_default();
    }

    /// Drop a tree's registration; once its count reaches zero its hash
    /// entries and search-info are forgotten.
    pub fn unregister_index(&self, index_id: u64) {
        let mut g = self.inner.write().unwrap();
        let gone = match g.index_refs.get_mut(&index_id) {
            Some(c) if *c > 1 => {
                *c -= 1;
                false
            }
            Some(_) => true,
            None => true,
        };
        if gone {
            g.index_refs.remove(&index_id);
            g.search_info.remove(&index_id);
            // entries keyed under this index's folds are left in the table;
            // `guess_on_hash` always re-validates a candidate against the
            // live page, so a stale orphaned entry is just a future miss,
            // never a wrong answer.
        }
    }

    /// `btr_search_sys_t::close`: fails with [`DbErr::Fail`] while any
    /// index still holds a registration, matching the "ref count must
    /// reach zero" close contract.
    pub fn close(&self) -> Result<()> {
        let g = self.inner.read().unwrap();
        if !g.index_refs.is_empty() {
            return Err(DbErr::Fail);
        }
        Ok(())
    }

    /// `btr_search_info_update_slow`: accumulate one search's match
    /// statistics and report whether the hash-analysis threshold was
    /// just crossed, i.e. whether the caller should now build (or
    /// extend) the hash over the pages it has been touching.
    pub fn search_info_update(&self, index_id: u64, up_match: usize, low_match: usize) -> bool {
        let mut g = self.inner.write().unwrap();
        let info = g.search_info.entry(index_id).or_default();

        let n_matched = up_match.max(low_match).max(1);
        if n_matched != info.n_fields {
            info.n_fields = n_matched;
            info.n_bytes = 0;
            info.hash_analysis = 0;
            return false;
        }

        info.hash_analysis += 1;
        if info.hash_analysis < BTR_SEARCH_HASH_ANALYSIS {
            return false;
        }
        info.hash_analysis = 0;
        true
    }

    /// `btr_search_build_page_hash_index`: insert every user record of
    /// `page_no` into the table under `index`'s recommended prefix
    /// (`info.n_fields` leading fields). Called once `search_info_update`
    /// reports the threshold was crossed.
    pub fn build_page_hash_index<B: BufferPool>(
        &self,
        pool: &mut B,
        index_id: u64,
        index: &IndexDesc,
        page_no: u32,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let n_fields = {
            let g = self.inner.read().unwrap();
            g.search_info
                .get(&index_id)
                .map(|i| i.n_fields)
                .unwrap_or(1)
        };

        let is_comp = index.is_comp;
        let entries = pool.with_page(page_no, |page| {
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
                let fold = rem0rec::fold(page, cur, &offsets, n_fields);
                out.push((fold, cur));
            }
            out
        })?;

        let mut g = self.inner.write().unwrap();
        g.table
            .retain(|_, nodes| {
                nodes.retain(|n| n.page_no != page_no);
                !nodes.is_empty()
            });
        for (fold, rec_offset) in entries {
            let key = hash_key(index_id, fold);
            g.table
                .entry(key)
                .or_default()
                .push(HashNode { page_no, rec_offset });
        }
        Ok(())
    }

    /// `btr_search_guess_on_hash`: probe the table for `tuple`'s
    /// recommended-prefix fold, and validate the candidate still compares
    /// equal to `tuple` under the live page (the hash does not guard the
    /// next-rec chain, only the fields a node points at, so a stale entry
    /// is always possible and must never be trusted blind). Returns `None`
    /// on a miss, a stale candidate, or a search mode the guess path does
    /// not support ([`PageCurMode::Dbg`] disables it outright).
    pub fn guess_on_hash<B: BufferPool>(
        &self,
        pool: &mut B,
        index_id: u64,
        index: &IndexDesc,
        tuple: &DTuple,
        mode: PageCurMode,
    ) -> Result<Option<HashNode>> {
        if mode == PageCurMode::Dbg {
            return Ok(None);
        }
        if !matches!(
            mode,
            PageCurMode::Less | PageCurMode::LessOrEqual | PageCurMode::Greater | PageCurMode::GreaterOrEqual
        ) {
            return Ok(None);
        }

        let n_fields = {
            let g = self.inner.read().unwrap();
            if !g.enabled {
                return Ok(None);
            }
            g.search_info
                .get(&index_id)
                .map(|i| i.n_fields)
                .unwrap_or(1)
        };

        let mut probe = tuple.clone();
        probe.set_n_fields_cmp(n_fields.min(probe.n_fields()));
        let fold = fold_of_tuple(&probe, index);
        let key = hash_key(index_id, fold);

        let candidates: Vec<HashNode> = {
            let g = self.inner.read().unwrap();
            match g.table.get(&key) {
                Some(v) => v.clone(),
                None => {
                    drop(g);
                    self.record_timeout();
                    return Ok(None);
                }
            }
        };

        for node in candidates {
            let is_comp = index.is_comp;
            let matches = pool.with_page(node.page_no, |page| {
                let Ok(offsets) = RecOffsets::compute(page, node.rec_offset, index) else {
                    return false;
                };
                let (mf, _, ord) =
                    page0cur::cmp_dtuple_rec(&probe, page, node.rec_offset, &offsets, index);
                ord == std::cmp::Ordering::Equal && mf >= n_fields
            })?;
            if matches {
                self.record_hit();
                return Ok(Some(node));
            }
        }
        self.record_timeout();
        Ok(None)
    }

    fn record_hit(&self) {
        let mut g = self.inner.write().unwrap();
        if let Some(info) = g.search_info.values_mut().next() {
            info.last_hash_succeeded = true;
            info.n_hash_potential = (info.n_hash_potential + 1).min(BTR_SEARCH_ON_HASH_LIMIT);
        }
    }

    fn record_timeout(&self) {
        let mut g = self.inner.write().unwrap();
        g.timeouts += 1;
        if g.timeouts >= BTR_SEA_TIMEOUT {
            g.timeouts = 0;
        }
    }

    /// `btr_search_update_hash_on_insert`: add `rec_offset`'s entry to the
    /// table under the index's current recommended prefix. A cheap
    /// incremental patch rather than a rebuild; safe to call even when no
    /// hash has been built yet for this page (a no-op miss on later
    /// probes until [`Self::build_page_hash_index`] runs).
    pub fn update_hash_on_insert(
        &self,
        index_id: u64,
        index: &IndexDesc,
        page: &[u8],
        page_no: u32,
        rec_offset: usize,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let n_fields = {
            let g = self.inner.read().unwrap();
            g.search_info
                .get(&index_id)
                .map(|i| i.n_fields)
                .unwrap_or(1)
        };
        let offsets = RecOffsets::compute(page, rec_offset, index)?;
        let fold = rem0rec::fold(page, rec_offset, &offsets, n_fields);
        let key = hash_key(index_id, fold);
        let mut g = self.inner.write().unwrap();
        g.table
            .entry(key)
            .or_default()
            .push(HashNode { page_no, rec_offset });
        Ok(())
    }

    /// `btr_search_update_hash_on_delete`: drop any entry pointing at
    /// `rec_offset` on `page_no`. Must run before the record's bytes are
    /// reused by the free list, since after that its fold can no longer
    /// be recomputed to find the right bucket; callers pass the offsets
    /// computed just before the delete.
    pub fn update_hash_on_delete(
        &self,
        index_id: u64,
        index: &IndexDesc,
        page: &[u8],
        page_no: u32,
        rec_offset: usize,
    ) -> Result<()> {
        let n_fields = {
            let g = self.inner.read().unwrap();
            g.search_info
                .get(&index_id)
                .map(|i| i.n_fields)
                .unwrap_or(1)
        };
        let offsets = RecOffsets::compute(page, rec_offset, index)?;
        let fold = rem0rec::fold(page, rec_offset, &offsets, n_fields);
        let key = hash_key(index_id, fold);
        let mut g = self.inner.write().unwrap();
        if let Some(nodes) = g.table.get_mut(&key) {
            nodes.retain(|n| !(n.page_no == page_no && n.rec_offset == rec_offset));
            if nodes.is_empty() {
                g.table.remove(&key);
            }
        }
        Ok(())
    }

    /// `btr_search_drop_page_hash_index`: forget every entry pointing at
    /// `page_no`, e.g. before a reorganize, split or merge invalidates
    /// every offset the hash currently holds for it.
    pub fn drop_page_hash_index(&self, page_no: u32) {
        let mut g = self.inner.write().unwrap();
        g.table.retain(|_, nodes| {
            nodes.retain(|n| n.page_no != page_no);
            !nodes.is_empty()
        });
    }

    /// Count of entries the table currently holds for `page_no`; used by
    /// the "no stale entry survives a split/merge" testable property.
    pub fn entries_for_page(&self, page_no: u32) -> usize {
        let g = self.inner.read().unwrap();
        g.table
            .values()
            .flat_map(|v| v.iter())
            .filter(|n| n.page_no == page_no)
            .count()
    }
}

impl Default for AdaptiveHashIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold a tuple's own field bytes the same way [`rem0rec::fold`] folds a
/// stored record's, so a probe key built from a search tuple lands in the
/// same bucket as entries built from on-page records with identical key
/// bytes.
fn fold_of_tuple(tuple: &DTuple, index: &IndexDesc) -> u32 {
    let _ = index;
    let mut h: u32 = 0;
    for field in tuple.fields.iter().take(tuple.n_fields_cmp) {
        if field.is_null() {
            h = h.rotate_left(5) ^ 0xFF;
            continue;
        }
        for &b in field.data() {
            h = h.rotate_left(8) ^ u32::from(b).wrapping_mul(0x9E37_79B1);
        }
        h = h.rotate_left(5) ^ 0xFF;
    }
    h
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buf0buf_iface::{MemBufferPool, SimpleExtentAllocator};
    use crate::btr0btr::create_tree;
    use crate::btr0cur::optimistic_insert;
    use crate::btr0types::BtrLatchMode;
    use crate::data0data::{DATA_INT, DATA_NOT_NULL, DATA_VARCHAR, DField, DType};
    use crate::rem0types::FieldDef;

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

    #[test]
    fn search_info_update_crosses_threshold_after_17_matching_searches() {
        let ahi = AdaptiveHashIndex::new();
        ahi.register_index(1);
        let mut crossed = false;
        for _ in 0..BTR_SEARCH_HASH_ANALYSIS {
            crossed = ahi.search_info_update(1, 2, 2);
        }
        assert!(crossed);
    }

    #[test]
    fn search_info_update_resets_on_a_different_match_count() {
        let ahi = AdaptiveHashIndex::new();
        ahi.register_index(1);
        for _ in 0..(BTR_SEARCH_HASH_ANALYSIS - 1) {
            ahi.search_info_update(1, 2, 2);
        }
        // a differently-shaped search resets the accumulator.
        assert!(!ahi.search_info_update(1, 1, 1));
        for _ in 0..(BTR_SEARCH_HASH_ANALYSIS - 1) {
            assert!(!ahi.search_info_update(1, 1, 1));
        }
        assert!(ahi.search_info_update(1, 1, 1));
    }

    #[test]
    fn build_then_guess_finds_the_inserted_record() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let mut btr = create_tree(&mut pool, &mut alloc, 0, 7, index_desc(), true).unwrap();
        let ahi = AdaptiveHashIndex::new();
        ahi.register_index(btr.index_id);

        let t = tuple(5, "hello");
        let cur = crate::btr0cur::search_to_nth_level(
            &mut pool,
            &btr,
            0,
            &t,
            PageCurMode::LessOrEqual,
            BtrLatchMode::ModifyLeaf,
        )
        .unwrap();
        let (off, _) = optimistic_insert(&mut pool, &mut btr, &cur, &t).unwrap();

        ahi.build_page_hash_index(&mut pool, btr.index_id, &btr.index, cur.page_no)
            .unwrap();

        let mut probe = t.clone();
        probe.set_n_fields_cmp(1);
        let hit = ahi
            .guess_on_hash(
                &mut pool,
                btr.index_id,
                &btr.index,
                &probe,
                PageCurMode::LessOrEqual,
            )
            .unwrap();
        assert_eq!(hit, Some(HashNode { page_no: cur.page_no, rec_offset: off }));
    }

    #[test]
    fn dropping_a_page_removes_all_its_entries() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let mut btr = create_tree(&mut pool, &mut alloc, 0, 9, index_desc(), true).unwrap();
        let ahi = AdaptiveHashIndex::new();
        ahi.register_index(btr.index_id);

        for (id, s) in [(1, "a"), (2, "b"), (3, "c")] {
            let t = tuple(id, s);
            let cur = crate::btr0cur::search_to_nth_level(
                &mut pool,
                &btr,
                0,
                &t,
                PageCurMode::LessOrEqual,
                BtrLatchMode::ModifyLeaf,
            )
            .unwrap();
            optimistic_insert(&mut pool, &mut btr, &cur, &t).unwrap();
        }
        ahi.build_page_hash_index(&mut pool, btr.index_id, &btr.index, btr.root_page_no)
            .unwrap();
        assert_eq!(ahi.entries_for_page(btr.root_page_no), 3);

        ahi.drop_page_hash_index(btr.root_page_no);
        assert_eq!(ahi.entries_for_page(btr.root_page_no), 0);
    }

    #[test]
    fn disable_clears_the_table_and_blocks_new_guesses() {
        let mut pool = MemBufferPool::new(16384);
        let mut alloc = SimpleExtentAllocator::new(0);
        let mut btr = create_tree(&mut pool, &mut alloc, 0, 3, index_desc(), true).unwrap();
        let ahi = AdaptiveHashIndex::new();
        ahi.register_index(btr.index_id);

        let t = tuple(1, "x");
        let cur = crate::btr0cur::search_to_nth_level(
            &mut pool,
            &btr,
            0,
            &t,
            PageCurMode::LessOrEqual,
            BtrLatchMode::ModifyLeaf,
        )
        .unwrap();
        optimistic_insert(&mut pool, &mut btr, &cur, &t).unwrap();
        ahi.build_page_hash_index(&mut pool, btr.index_id, &btr.index, cur.page_no)
            .unwrap();
        assert!(ahi.entries_for_page(cur.page_no) > 0);

        ahi.disable();
        assert_eq!(ahi.entries_for_page(cur.page_no), 0);
        let mut probe = t.clone();
        probe.set_n_fields_cmp(1);
        let hit = ahi
            .guess_on_hash(&mut pool, btr.index_id, &btr.index, &probe, PageCurMode::LessOrEqual)
            .unwrap();
        assert_eq!(hit, None);
    }

    #[test]
    fn close_fails_while_an_index_is_still_registered() {
        let ahi = AdaptiveHashIndex::new();
        ahi.register_index(1);
        assert!(ahi.close().is_err());
        ahi.unregister_index(1);
        assert!(ahi.close().is_ok());
    }
}
