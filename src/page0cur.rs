//! The page cursor: binary search over the page directory followed by a
//! bounded linear walk within the matching slot's owned group, record
//! insertion and deletion, and directory slot maintenance.
//!
//! Grounded in `page_cur.hpp`'s `page_cur_search_with_match` /
//! `page_cur_insert_rec_low` / `page_cur_delete_rec`. Unlike the original,
//! this port assigns ascending directory slot indices to ascending key
//! order (slot 0 owns the group ending at infimum, the last slot owns the
//! group ending at supremum): the byte layout the directory lives in is
//! unchanged, only which end a reader starts scanning from, which is an
//! implementation detail the original hides behind `page_dir_get_nth_slot`
//! in any case.

use std::cmp::Ordering;

use crate::data0data::DTuple;
use crate::error::Result;
use crate::mach;
use crate::page0types::{
    self, PAGE_DIR_SLOT_MAX_N_OWNED, PAGE_DIR_SLOT_MIN_N_OWNED, PAGE_DIR_SLOT_SIZE, PAGE_DIRECTION,
    PAGE_FREE, PAGE_GARBAGE, PAGE_HEAP_TOP, PAGE_LAST_INSERT, PAGE_LEFT, PAGE_N_DIR_SLOTS,
    PAGE_N_DIRECTION, PAGE_N_HEAP, PAGE_N_RECS, PAGE_NO_DIRECTION, PAGE_RIGHT, PageCurMode,
};
use crate::rem0rec::{self, RecHeader, RecOffsets};
use crate::rem0types::{IndexDesc, REC_INFO_DELETED_FLAG, REC_STATUS_ORDINARY};

/// A cursor's logical position: the byte offset of the record origin it
/// currently points at. The infimum/supremum sentinels are valid
/// positions ("before first"/"after last").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub rec_offset: usize,
}

impl PageCursor {
    pub fn before_first(is_comp: bool) -> Self {
        PageCursor {
            rec_offset: page0types::page_infimum_offset(is_comp),
        }
    }

    pub fn is_before_first(&self, is_comp: bool) -> bool {
        self.rec_offset == page0types::page_infimum_offset(is_comp)
    }

    pub fn is_after_last(&self, is_comp: bool) -> bool {
        self.rec_offset == page0types::page_supremum_offset(is_comp)
    }
}

/// Outcome of [`search`]: the resting cursor plus the matched-field and
/// matched-byte counts against the upper (`up_*`) and lower (`low_*`)
/// bracketing records.
#[derive(Debug, Clone, Copy)]
pub struct SearchResult {
    pub cursor: PageCursor,
    pub up_match: usize,
    pub up_bytes: usize,
    pub low_match: usize,
    pub low_bytes: usize,
}

/// Compare `tuple`'s first `n_fields_cmp` fields against the record at
/// `rec_offset`, field by field and then byte by byte within the first
/// differing field. NULL sorts below any non-NULL value. Returns the
/// number of fully-matched leading fields, the number of matched bytes
/// within the first differing field, and the ordering of `tuple` against
/// the record.
pub fn cmp_dtuple_rec(
    tuple: &DTuple,
    page: &[u8],
    rec_offset: usize,
    offsets: &RecOffsets,
    _index: &IndexDesc,
) -> (usize, usize, Ordering) {
    let n = tuple.n_fields_cmp.min(offsets.n_fields());
    for i in 0..n {
        let tf = &tuple.fields[i];
        let rec_null = offsets.is_null(i);
        match (tf.is_null(), rec_null) {
            (true, true) => continue,
            (true, false) => return (i, 0, Ordering::Less),
            (false, true) => return (i, 0, Ordering::Greater),
            (false, false) => {}
        }
        let tdata = tf.data();
        let rdata = offsets.field_data(page, rec_offset, i);
        let common = tdata.len().min(rdata.len());
        for j in 0..common {
            if tdata[j] != rdata[j] {
                return (i, j, tdata[j].cmp(&rdata[j]));
            }
        }
        if tdata.len() != rdata.len() {
            return (i, common, tdata.len().cmp(&rdata.len()));
        }
    }
    (n, 0, Ordering::Equal)
}

/// Compare a tuple against the record at `rec_offset`, treating the
/// infimum/supremum sentinels as -infinity/+infinity without touching
/// their (non-indexed) payload.
fn cmp_tuple_at(
    tuple: &DTuple,
    page: &[u8],
    rec_offset: usize,
    index: &IndexDesc,
) -> Result<(usize, usize, Ordering)> {
    let is_comp = index.is_comp;
    if rec_offset == page0types::page_infimum_offset(is_comp) {
        return Ok((0, 0, Ordering::Greater));
    }
    if rec_offset == page0types::page_supremum_offset(is_comp) {
        return Ok((0, 0, Ordering::Less));
    }
    let offsets = RecOffsets::compute(page, rec_offset, index)?;
    Ok(cmp_dtuple_rec(tuple, page, rec_offset, &offsets, index))
}

/// Read the next-record link at `rec_offset` (a signed displacement
/// relative to the record's own origin) and return the absolute offset it
/// points at.
pub fn rec_get_next_offset(page: &[u8], rec_offset: usize, is_comp: bool) -> usize {
    let hdr = rem0rec::read_header(page, rec_offset, is_comp);
    let delta = hdr.next_offset as i16 as isize;
    (rec_offset as isize + delta) as usize
}

fn set_next_offset(page: &mut [u8], rec_offset: usize, is_comp: bool, target: usize) {
    let mut hdr = rem0rec::read_header(page, rec_offset, is_comp);
    let delta = target as isize - rec_offset as isize;
    hdr.next_offset = delta as i16 as u16;
    rem0rec::write_header(page, rec_offset, is_comp, &hdr);
}

fn slot_rec_offset(page: &[u8], page_size: usize, slot: usize) -> usize {
    let pos = page0types::page_dir_get_nth_slot(page_size, slot);
    mach::mach_read_from_2(&page[pos..]) as usize
}

fn set_slot_rec_offset(page: &mut [u8], page_size: usize, slot: usize, rec_offset: usize) {
    let pos = page0types::page_dir_get_nth_slot(page_size, slot);
    mach::mach_write_to_2(&mut page[pos..], rec_offset as u16).unwrap();
}

/// Binary search the directory, then a bounded linear walk within the
/// owning slot's group, for the tuple's resting position under `mode`.
pub fn search(
    page: &[u8],
    page_size: usize,
    index: &IndexDesc,
    tuple: &DTuple,
    mode: PageCurMode,
) -> Result<SearchResult> {
    let is_comp = index.is_comp;
    let n_slots = page0types::page_get_n_dir_slots(page) as usize;
    debug_assert!(n_slots >= 2);

    // P(i) := record at slot i compares greater than tuple. Monotonic
    // non-decreasing in i since slot index ascends with key; P(0) is
    // always false (slot 0's group bottoms out at infimum) and
    // P(n_slots-1) is always true (it bottoms out at supremum).
    let mut lo = 0usize;
    let mut hi = n_slots - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        let mid_off = slot_rec_offset(page, page_size, mid);
        let (_, _, ord) = cmp_tuple_at(tuple, page, mid_off, index)?;
        if ord == Ordering::Less {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    // Walk forward from slot[lo]'s record (guaranteed <= tuple) up to and
    // including slot[hi]'s record (guaranteed > tuple), tracking the
    // tightest <= and < boundaries as we go.
    let mut cur = slot_rec_offset(page, page_size, lo);
    let mut low = cur;
    let mut low_match = 0usize;
    let mut low_bytes = 0usize;
    let mut low_is_equal = false;
    let mut strict_low = cur;
    let mut strict_match = 0usize;
    let mut strict_bytes = 0usize;
    let mut up;
    let mut up_match;
    let mut up_bytes;

    loop {
        let (mf, mb, ord) = cmp_tuple_at(tuple, page, cur, index)?;
        match ord {
            Ordering::Less => {
                up = cur;
                up_match = mf;
                up_bytes = mb;
                break;
            }
            Ordering::Equal => {
                low = cur;
                low_match = mf;
                low_bytes = mb;
                low_is_equal = true;
            }
            Ordering::Greater => {
                low = cur;
                low_match = mf;
                low_bytes = mb;
                low_is_equal = false;
                strict_low = cur;
                strict_match = mf;
                strict_bytes = mb;
            }
        }
        if cur == page0types::page_supremum_offset(is_comp) {
            // Should not happen: slot[hi] is > tuple and reached first.
            up = cur;
            up_match = 0;
            up_bytes = 0;
            break;
        }
        cur = rec_get_next_offset(page, cur, is_comp);
    }

    let cursor = match mode {
        PageCurMode::LessOrEqual | PageCurMode::Dbg => PageCursor { rec_offset: low },
        PageCurMode::Less => PageCursor {
            rec_offset: strict_low,
        },
        PageCurMode::GreaterOrEqual => PageCursor {
            rec_offset: if low_is_equal { low } else { up },
        },
        PageCurMode::Greater => PageCursor { rec_offset: up },
    };

    Ok(SearchResult {
        cursor,
        up_match,
        up_bytes,
        low_match: if mode == PageCurMode::Less {
            strict_match
        } else {
            low_match
        },
        low_bytes: if mode == PageCurMode::Less {
            strict_bytes
        } else {
            low_bytes
        },
    })
}

/// Bytes of free space currently usable for a new record: the gap
/// between the heap top and the directory, plus whatever the free list
/// would reclaim (conservatively not counted here, matching the
/// original's "may_need_recreate" caution around reusing a
/// not-quite-large-enough free slot).
pub fn free_space(page: &[u8], page_size: usize) -> usize {
    let heap_top = page0types::page_header_get_field(page, PAGE_HEAP_TOP) as usize;
    let n_slots = page0types::page_get_n_dir_slots(page) as usize;
    let dir_start = page_size
        - crate::fil0fil::FIL_PAGE_DATA_END as usize
        - n_slots * PAGE_DIR_SLOT_SIZE;
    dir_start.saturating_sub(heap_top)
}

/// Insert `tuple`'s physical image right after `cursor`. Returns the new
/// record's offset, or `Ok(None)` if the page does not have room (the
/// page is left byte-for-byte unchanged on that path).
#[allow(clippy::too_many_arguments)]
pub fn tuple_insert(
    page: &mut [u8],
    page_size: usize,
    cursor: PageCursor,
    tuple: &DTuple,
    index: &IndexDesc,
) -> Result<Option<usize>> {
    let is_comp = index.is_comp;
    let needed = rem0rec::converted_size(tuple, index);
    // one extra directory slot may be needed if this insert tips a group
    // over PAGE_DIR_SLOT_MAX_N_OWNED.
    if needed + PAGE_DIR_SLOT_SIZE > free_space(page, page_size) {
        return Ok(None);
    }

    let n_heap_raw = page0types::page_header_get_field(page, PAGE_N_HEAP);
    let comp_flag = n_heap_raw & 0x8000;
    let heap_no = n_heap_raw & 0x7FFF;
    let (buf, origin_in_buf) =
        rem0rec::convert_dtuple_to_rec(tuple, index, heap_no, REC_STATUS_ORDINARY)?;

    let heap_top = page0types::page_header_get_field(page, PAGE_HEAP_TOP) as usize;
    let target_start = heap_top;
    let rec_offset = target_start + origin_in_buf;
    page[target_start..target_start + buf.len()].copy_from_slice(&buf);

    // splice into the next-rec chain right after `cursor`.
    let next = rec_get_next_offset(page, cursor.rec_offset, is_comp);
    set_next_offset(page, cursor.rec_offset, is_comp, rec_offset);
    set_next_offset(page, rec_offset, is_comp, next);

    // carry delete-mark ownership forward per invariant 6: a fresh
    // insert owns nothing and is never delete-marked.
    let mut hdr = rem0rec::read_header(page, rec_offset, is_comp);
    hdr.info_bits &= !REC_INFO_DELETED_FLAG;
    hdr.n_owned = 0;
    rem0rec::write_header(page, rec_offset, is_comp, &hdr);

    page0types::page_header_set_field(page, PAGE_HEAP_TOP, (heap_top + buf.len()) as u16);
    page0types::page_header_set_field(page, PAGE_N_HEAP, comp_flag | (heap_no + 1));
    let n_recs = page0types::page_header_get_field(page, PAGE_N_RECS);
    page0types::page_header_set_field(page, PAGE_N_RECS, n_recs + 1);

    update_insert_direction(page, rec_offset);
    grow_owning_slot(page, page_size, is_comp, rec_offset)?;

    Ok(Some(rec_offset))
}

fn update_insert_direction(page: &mut [u8], rec_offset: usize) {
    let last_insert = page0types::page_header_get_field(page, PAGE_LAST_INSERT) as usize;
    let direction = page0types::page_header_get_field(page, PAGE_DIRECTION);
    let n_direction = page0types::page_header_get_field(page, PAGE_N_DIRECTION);
    let new_direction = if last_insert == 0 {
        PAGE_NO_DIRECTION
    } else if rec_offset > last_insert {
        PAGE_RIGHT
    } else {
        PAGE_LEFT
    };
    if new_direction == direction && new_direction != PAGE_NO_DIRECTION {
        page0types::page_header_set_field(page, PAGE_N_DIRECTION, n_direction + 1);
    } else {
        page0types::page_header_set_field(page, PAGE_DIRECTION, new_direction);
        page0types::page_header_set_field(page, PAGE_N_DIRECTION, 1);
    }
    page0types::page_header_set_field(page, PAGE_LAST_INSERT, rec_offset as u16);
}

/// Increment the `n_owned` count of the slot owning `rec_offset`'s group;
/// split the group into two if it now exceeds [`PAGE_DIR_SLOT_MAX_N_OWNED`].
fn grow_owning_slot(
    page: &mut [u8],
    page_size: usize,
    is_comp: bool,
    rec_offset: usize,
) -> Result<()> {
    let n_slots = page0types::page_get_n_dir_slots(page) as usize;
    let mut slot = None;
    let mut cur = rec_offset;
    // walk forward from the new record to find the slot that owns it
    // (the first record at or after it that is itself a slot owner).
    for s in 0..n_slots {
        if slot_rec_offset(page, page_size, s) == rec_offset {
            slot = Some(s);
            break;
        }
    }
    if slot.is_none() {
        loop {
            let mut found = None;
            for s in 0..n_slots {
                if slot_rec_offset(page, page_size, s) == cur {
                    found = Some(s);
                    break;
                }
            }
            if let Some(s) = found {
                slot = Some(s);
                break;
            }
            cur = rec_get_next_offset(page, cur, is_comp);
        }
    }
    let slot = slot.unwrap();
    let owner_off = slot_rec_offset(page, page_size, slot);
    let mut hdr = rem0rec::read_header(page, owner_off, is_comp);
    hdr.n_owned += 1;
    rem0rec::write_header(page, owner_off, is_comp, &hdr);

    if (hdr.n_owned as usize) <= PAGE_DIR_SLOT_MAX_N_OWNED as usize {
        return Ok(());
    }

    // split this slot's group into two halves, inserting a new slot for
    // the lower half (walking from the previous slot's record, which is
    // the group's start boundary).
    let prev_owner = if slot == 0 {
        page0types::page_infimum_offset(is_comp)
    } else {
        slot_rec_offset(page, page_size, slot - 1)
    };
    let mut members = Vec::new();
    let mut c = prev_owner;
    loop {
        c = rec_get_next_offset(page, c, is_comp);
        members.push(c);
        if c == owner_off {
            break;
        }
    }
    let mid = members[members.len() / 2 - 1];

    shift_slots_right(page, page_size, n_slots, slot);
    set_slot_rec_offset(page, page_size, slot, mid);
    page0types::page_header_set_field(page, PAGE_N_DIR_SLOTS, (n_slots + 1) as u16);

    let lower_count = members.iter().position(|&m| m == mid).unwrap() + 1;
    let upper_count = members.len() - lower_count;
    let mut lower_hdr = rem0rec::read_header(page, mid, is_comp);
    lower_hdr.n_owned = lower_count as u8;
    rem0rec::write_header(page, mid, is_comp, &lower_hdr);
    let mut upper_hdr = rem0rec::read_header(page, owner_off, is_comp);
    upper_hdr.n_owned = upper_count as u8;
    rem0rec::write_header(page, owner_off, is_comp, &upper_hdr);

    Ok(())
}

fn shift_slots_right(page: &mut [u8], page_size: usize, n_slots: usize, insert_at: usize) {
    for s in (insert_at..n_slots).rev() {
        let v = slot_rec_offset(page, page_size, s);
        set_slot_rec_offset(page, page_size, s + 1, v);
    }
}

/// Delete the record at `cursor` from the next-rec chain, join it to the
/// free list, and coalesce its owning directory slot's group if it falls
/// below [`PAGE_DIR_SLOT_MIN_N_OWNED`].
pub fn delete(
    page: &mut [u8],
    page_size: usize,
    index: &IndexDesc,
    prev: PageCursor,
    target: PageCursor,
) -> Result<()> {
    let is_comp = index.is_comp;
    let offsets = RecOffsets::compute(page, target.rec_offset, index)?;
    let rec_size = offsets.extra_size + offsets.data_size;
    let next = rec_get_next_offset(page, target.rec_offset, is_comp);

    // locate the slot owning this record's group while the chain is
    // still intact; the record's own next-rec field is about to be
    // repurposed to thread the free list.
    let n_slots = page0types::page_get_n_dir_slots(page) as usize;
    let mut owner_slot = None;
    let mut cur = target.rec_offset;
    loop {
        if let Some(s) = (0..n_slots).find(|&s| slot_rec_offset(page, page_size, s) == cur) {
            owner_slot = Some(s);
            break;
        }
        cur = rec_get_next_offset(page, cur, is_comp);
    }
    let owner_slot = owner_slot.unwrap();

    set_next_offset(page, prev.rec_offset, is_comp, next);

    // splice into the page free list (singly linked, newest at head).
    let free_head = page0types::page_header_get_field(page, PAGE_FREE) as usize;
    set_next_offset(
        page,
        target.rec_offset,
        is_comp,
        if free_head == 0 {
            target.rec_offset
        } else {
            free_head
        },
    );
    if free_head == 0 {
        let mut hdr = rem0rec::read_header(page, target.rec_offset, is_comp);
        hdr.next_offset = 0;
        rem0rec::write_header(page, target.rec_offset, is_comp, &hdr);
    }
    page0types::page_header_set_field(page, PAGE_FREE, target.rec_offset as u16);

    let garbage = page0types::page_header_get_field(page, PAGE_GARBAGE);
    page0types::page_header_set_field(page, PAGE_GARBAGE, garbage + rec_size as u16);
    let n_recs = page0types::page_header_get_field(page, PAGE_N_RECS);
    page0types::page_header_set_field(page, PAGE_N_RECS, n_recs.saturating_sub(1));

    shrink_owning_slot(page, page_size, is_comp, owner_slot, target.rec_offset, next)?;

    Ok(())
}

fn shrink_owning_slot(
    page: &mut [u8],
    page_size: usize,
    is_comp: bool,
    slot: usize,
    deleted_rec: usize,
    replacement: usize,
) -> Result<()> {
    let n_slots = page0types::page_get_n_dir_slots(page) as usize;
    let mut owner_off = slot_rec_offset(page, page_size, slot);
    if owner_off == deleted_rec {
        // the deleted record was itself the slot's pointer; re-point the
        // slot at the record that now occupies its place in the chain.
        owner_off = replacement;
        set_slot_rec_offset(page, page_size, slot, owner_off);
    }
    let mut hdr = rem0rec::read_header(page, owner_off, is_comp);
    hdr.n_owned = hdr.n_owned.saturating_sub(1);
    rem0rec::write_header(page, owner_off, is_comp, &hdr);

    if n_slots <= 2 || hdr.n_owned as usize >= PAGE_DIR_SLOT_MIN_N_OWNED as usize {
        return Ok(());
    }
    if slot == n_slots - 1 {
        // the supremum-owning slot never merges away.
        return Ok(());
    }

    // merge this group into the next one (toward supremum) and drop the slot.
    let next_owner = slot_rec_offset(page, page_size, slot + 1);
    let mut next_hdr = rem0rec::read_header(page, next_owner, is_comp);
    next_hdr.n_owned += hdr.n_owned;
    rem0rec::write_header(page, next_owner, is_comp, &next_hdr);

    for s in slot..n_slots - 1 {
        let v = slot_rec_offset(page, page_size, s + 1);
        set_slot_rec_offset(page, page_size, s, v);
    }
    page0types::page_header_set_field(page, PAGE_N_DIR_SLOTS, (n_slots - 1) as u16);

    Ok(())
}

/// Walk the next-rec chain from infimum, counting user records; used by
/// the testable property "`n_recs` on header equals actual chain length".
pub fn count_chain(page: &[u8], is_comp: bool) -> usize {
    let mut cur = page0types::page_infimum_offset(is_comp);
    let supremum = page0types::page_supremum_offset(is_comp);
    let mut n = 0;
    loop {
        cur = rec_get_next_offset(page, cur, is_comp);
        if cur == supremum {
            break;
        }
        n += 1;
        if n > 100_000 {
            break;
        }
    }
    n
}

/// Initialize a freshly allocated page's header, infimum and supremum
/// records, and single directory slot pair. `level` is the B-tree level
/// (0 = leaf) this page is created at, matching `PAGE_CREATE`'s redo
/// contract.
pub fn create_page(page: &mut [u8], page_size: usize, is_comp: bool, level: u16, index_id: u64) {
    for b in page[page0types::PAGE_HEADER..page_size - crate::fil0fil::FIL_PAGE_DATA_END as usize]
        .iter_mut()
    {
        *b = 0;
    }
    page0types::page_header_set_field(page, PAGE_N_DIR_SLOTS, 2);
    page0types::page_header_set_field(
        page,
        PAGE_HEAP_TOP,
        page0types::page_supremum_end_offset(is_comp) as u16,
    );
    page0types::page_header_set_field(page, PAGE_N_HEAP, 2 | (is_comp as u16) << 15);
    page0types::page_header_set_field(page, PAGE_N_RECS, 0);
    page0types::page_header_set_field(page, PAGE_DIRECTION, PAGE_NO_DIRECTION);
    mach::mach_write_to_2(&mut page[page0types::PAGE_LEVEL..], level).unwrap();
    mach::mach_write_to_8(&mut page[page0types::PAGE_INDEX_ID..], index_id).unwrap();

    let infimum = page0types::page_infimum_offset(is_comp);
    let supremum = page0types::page_supremum_offset(is_comp);
    if is_comp {
        page[infimum..infimum + 8].copy_from_slice(b"infimum\0");
        page[supremum..supremum + 8].copy_from_slice(b"supremum");
    }
    let mut inf_hdr = RecHeader {
        info_bits: 0,
        n_owned: 1,
        heap_no: 0,
        status: crate::rem0types::REC_STATUS_INFIMUM,
        next_offset: 0,
    };
    rem0rec::write_header(page, infimum, is_comp, &inf_hdr);
    let sup_hdr = RecHeader {
        info_bits: 0,
        n_owned: 1,
        heap_no: 1,
        status: crate::rem0types::REC_STATUS_SUPREMUM,
        next_offset: 0,
    };
    rem0rec::write_header(page, supremum, is_comp, &sup_hdr);
    inf_hdr.next_offset = 0;
    set_next_offset(page, infimum, is_comp, supremum);

    set_slot_rec_offset(page, page_size, 0, infimum);
    set_slot_rec_offset(page, page_size, 1, supremum);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data0data::{DField, DType, DTuple, DATA_INT, DATA_NOT_NULL, DATA_VARCHAR};
    use crate::rem0types::FieldDef;

    fn index() -> IndexDesc {
        IndexDesc::new(
            true,
            vec![
                FieldDef::fixed(4, false),
                FieldDef::variable(200, false, false),
            ],
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

    fn new_page(page_size: usize, is_comp: bool) -> Vec<u8> {
        let mut page = vec![0u8; page_size];
        create_page(&mut page, page_size, is_comp, 0, 42);
        page
    }

    #[test]
    fn insert_three_ascending_and_search_them_back() {
        let page_size = 16384;
        let idx = index();
        let mut page = new_page(page_size, true);

        let mut cur = PageCursor::before_first(true);
        for (id, s) in [(1, "a"), (2, "b"), (3, "c")] {
            let res = search(&page, page_size, &idx, &tuple(id, ""), PageCurMode::LessOrEqual)
                .unwrap();
            cur = res.cursor;
            let off = tuple_insert(&mut page, page_size, cur, &tuple(id, s), &idx)
                .unwrap()
                .expect("fits");
            cur = PageCursor { rec_offset: off };
        }

        assert_eq!(count_chain(&page, true), 3);

        let res = search(&page, page_size, &idx, &tuple(2, ""), PageCurMode::LessOrEqual).unwrap();
        let offsets = RecOffsets::compute(&page, res.cursor.rec_offset, &idx).unwrap();
        assert_eq!(offsets.field_data(&page, res.cursor.rec_offset, 0), &2i32.to_be_bytes());
    }

    #[test]
    fn delete_middle_record_preserves_chain_order() {
        let page_size = 16384;
        let idx = index();
        let mut page = new_page(page_size, true);
        let mut offs = Vec::new();
        for (id, s) in [(1, "a"), (2, "b"), (3, "c")] {
            let res = search(&page, page_size, &idx, &tuple(id, ""), PageCurMode::LessOrEqual)
                .unwrap();
            let off = tuple_insert(&mut page, page_size, res.cursor, &tuple(id, s), &idx)
                .unwrap()
                .unwrap();
            offs.push(off);
        }

        let res = search(&page, page_size, &idx, &tuple(2, ""), PageCurMode::Less).unwrap();
        delete(
            &mut page,
            page_size,
            &idx,
            res.cursor,
            PageCursor { rec_offset: offs[1] },
        )
        .unwrap();

        assert_eq!(count_chain(&page, true), 2);
        assert_eq!(
            page0types::page_header_get_field(&page, PAGE_N_RECS),
            2
        );
    }
}
